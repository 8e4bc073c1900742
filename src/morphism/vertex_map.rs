/// A possibly partial map from domain vertices to codomain vertices.
pub trait VertexMap {
    fn get(&self, v: usize) -> Option<usize>;
    fn domain_bound(&self) -> usize;

    /// Mapped `(domain, codomain)` pairs in domain order.
    fn pairs(&self) -> Vec<(usize, usize)> {
        (0..self.domain_bound())
            .filter_map(|v| self.get(v).map(|w| (v, w)))
            .collect()
    }
}

/// A vertex map that also answers inverse lookups.
pub trait InvertibleMap: VertexMap {
    fn get_inverse(&self, w: usize) -> Option<usize>;
}

/// Plain forward map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VectorVertexMap {
    images: Vec<Option<usize>>,
}

impl VectorVertexMap {
    pub fn new(domain_bound: usize) -> Self {
        Self {
            images: vec![None; domain_bound],
        }
    }

    pub fn put(&mut self, v: usize, image: Option<usize>) {
        if v >= self.images.len() {
            self.images.resize(v + 1, None);
        }
        self.images[v] = image;
    }

    pub fn as_slice(&self) -> &[Option<usize>] {
        &self.images
    }
}

impl VertexMap for VectorVertexMap {
    fn get(&self, v: usize) -> Option<usize> {
        self.images.get(v).copied().flatten()
    }

    fn domain_bound(&self) -> usize {
        self.images.len()
    }
}

impl From<Vec<Option<usize>>> for VectorVertexMap {
    fn from(images: Vec<Option<usize>>) -> Self {
        Self { images }
    }
}

/// Injective partial map kept in both directions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct InvertibleVertexMap {
    forward: Vec<Option<usize>>,
    inverse: Vec<Option<usize>>,
    len: usize,
}

impl InvertibleVertexMap {
    pub fn new(domain_bound: usize, codomain_bound: usize) -> Self {
        Self {
            forward: vec![None; domain_bound],
            inverse: vec![None; codomain_bound],
            len: 0,
        }
    }

    /// Map `v` to `w`. Both must be free.
    pub fn put(&mut self, v: usize, w: usize) {
        assert!(self.forward[v].is_none(), "domain vertex {} already mapped", v);
        assert!(self.inverse[w].is_none(), "codomain vertex {} already used", w);
        self.forward[v] = Some(w);
        self.inverse[w] = Some(v);
        self.len += 1;
    }

    /// Unmap `v`, returning its former image.
    pub fn remove(&mut self, v: usize) -> Option<usize> {
        let w = self.forward[v].take()?;
        self.inverse[w] = None;
        self.len -= 1;
        Some(w)
    }

    /// Number of mapped vertices.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn codomain_bound(&self) -> usize {
        self.inverse.len()
    }

    pub fn grow_codomain(&mut self, codomain_bound: usize) {
        if codomain_bound > self.inverse.len() {
            self.inverse.resize(codomain_bound, None);
        }
    }

    pub fn inverted(&self) -> InvertibleVertexMap {
        InvertibleVertexMap {
            forward: self.inverse.clone(),
            inverse: self.forward.clone(),
            len: self.len,
        }
    }

    pub fn to_vector(&self) -> VectorVertexMap {
        VectorVertexMap::from(self.forward.clone())
    }
}

impl VertexMap for InvertibleVertexMap {
    fn get(&self, v: usize) -> Option<usize> {
        self.forward.get(v).copied().flatten()
    }

    fn domain_bound(&self) -> usize {
        self.forward.len()
    }
}

impl InvertibleMap for InvertibleVertexMap {
    fn get_inverse(&self, w: usize) -> Option<usize> {
        self.inverse.get(w).copied().flatten()
    }
}
