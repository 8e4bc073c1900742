//! Permutation groups kept as a stabiliser chain over a chosen base.

/// A permutation of `0..degree`, as the image of every point.
pub type Permutation = Vec<usize>;

/// `(a ∘ b)(v) = a(b(v))`.
pub fn compose(a: &[usize], b: &[usize]) -> Permutation {
    b.iter().map(|&v| a[v]).collect()
}

pub fn inverse(a: &[usize]) -> Permutation {
    let mut inv = vec![0; a.len()];
    for (v, &w) in a.iter().enumerate() {
        inv[w] = v;
    }
    inv
}

/// One level of a chain: the orbit of the base point under the pointwise stabiliser of the
/// base points before it.
#[derive(Debug, Clone)]
pub struct Level {
    base: usize,
    orbit: Vec<usize>,
    /// `transversal[k]` sends `base` to `orbit[k]`.
    transversal: Vec<Permutation>,
}

impl Level {
    pub fn base(&self) -> usize {
        self.base
    }

    /// The base point comes first.
    pub fn orbit(&self) -> &[usize] {
        &self.orbit
    }

    pub fn transversal(&self, k: usize) -> &[usize] {
        &self.transversal[k]
    }
}

/// A strong generating set with its stabiliser chain.
///
/// Level `i` describes the group fixing the first `i` base points. The generators found for
/// level `i` fix those points as well, so the generators of levels `i..` generate it.
#[derive(Debug, Clone)]
pub struct StabiliserChain {
    degree: usize,
    generators: Vec<Permutation>,
    levels: Vec<Level>,
}

fn orbit_of(point: usize, generators: &[Permutation], degree: usize) -> (Vec<usize>, Vec<Permutation>) {
    let mut orbit = vec![point];
    let mut transversal = vec![(0..degree).collect::<Permutation>()];
    let mut k = 0;
    while k < orbit.len() {
        for g in generators {
            let image = g[orbit[k]];
            if !orbit.contains(&image) {
                let t = compose(g, &transversal[k]);
                orbit.push(image);
                transversal.push(t);
            }
        }
        k += 1;
    }
    (orbit, transversal)
}

impl StabiliserChain {
    /// The trivial group.
    pub fn trivial(degree: usize, base: Vec<usize>) -> Self {
        Self::search(degree, base, |_, _, _| None)
    }

    /// Build the chain level by level from the last base point to the first.
    ///
    /// `find(fixed, point, image)` returns a group element that fixes every point of
    /// `fixed` and sends `point` to `image`, if there is one. It is only asked for images
    /// outside the orbit reached so far, so every answer becomes a generator.
    pub fn search<F>(degree: usize, base: Vec<usize>, mut find: F) -> Self
    where
        F: FnMut(&[usize], usize, usize) -> Option<Permutation>,
    {
        let mut generators: Vec<Permutation> = vec![];
        let mut levels = Vec::with_capacity(base.len());
        for i in (0..base.len()).rev() {
            let point = base[i];
            let (mut orbit, mut transversal) = orbit_of(point, &generators, degree);
            for image in 0..degree {
                if orbit.contains(&image) {
                    continue;
                }
                if let Some(g) = find(&base[..i], point, image) {
                    debug_assert_eq!(g[point], image);
                    generators.push(g);
                    let (o, t) = orbit_of(point, &generators, degree);
                    orbit = o;
                    transversal = t;
                }
            }
            levels.push(Level {
                base: point,
                orbit,
                transversal,
            });
        }
        levels.reverse();
        Self {
            degree,
            generators,
            levels,
        }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn generators(&self) -> &[Permutation] {
        &self.generators
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// Product of the orbit lengths. Saturates.
    pub fn order(&self) -> u128 {
        self.levels
            .iter()
            .fold(1u128, |acc, l| acc.saturating_mul(l.orbit.len() as u128))
    }

    /// Sift `p` through the chain.
    pub fn is_member(&self, p: &[usize]) -> bool {
        if p.len() != self.degree {
            return false;
        }
        let mut rest: Permutation = p.to_vec();
        for level in &self.levels {
            let k = match level.orbit.iter().position(|&o| o == rest[level.base]) {
                Some(k) => k,
                None => return false,
            };
            rest = compose(&inverse(&level.transversal[k]), &rest);
        }
        rest.iter().enumerate().all(|(v, &w)| v == w)
    }
}
