//! First-order term labels.
//!
//! A label such as `C`, `O-` or `f(_X, a)` is parsed into a [`Term`]. Names starting with
//! an underscore are variables; `_` alone is an anonymous variable that is distinct on every
//! occurrence. Everything else is an atom or a compound functor.

use crate::config::LabelRelation;
use crate::error::Error;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

pub type Symbol = Rc<str>;

/// Interns the names used by terms so equal names share one allocation.
#[derive(Debug, Default)]
pub struct StringStore {
    symbols: HashSet<Rc<str>>,
    anonymous: usize,
}

impl StringStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, name: &str) -> Symbol {
        if let Some(existing) = self.symbols.get(name) {
            return existing.clone();
        }
        let symbol: Symbol = Rc::from(name);
        self.symbols.insert(symbol.clone());
        symbol
    }

    /// A variable name no parsed label can produce.
    pub fn fresh_variable(&mut self) -> Symbol {
        self.anonymous += 1;
        let name = format!("_#{}", self.anonymous);
        self.intern(&name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn clear(&mut self) {
        self.symbols.clear();
        self.anonymous = 0;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Variable(Symbol),
    Atom(Symbol),
    Compound(Symbol, Vec<Term>),
}

impl Term {
    pub fn parse(label: &str, store: &mut StringStore) -> Result<Term, Error> {
        let mut parser = Parser {
            label,
            chars: label.char_indices().peekable(),
            store,
        };
        let term = parser.term()?;
        parser.skip_whitespace();
        match parser.chars.peek() {
            None => Ok(term),
            Some(&(i, c)) => Err(parser.error(format!("unexpected '{}' at {}", c, i))),
        }
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Variable(_))
    }

    /// Structural pre-check used before a full unification: constants must agree,
    /// variables match anything.
    pub fn may_match(&self, other: &Term) -> bool {
        match (self, other) {
            (Term::Variable(_), _) | (_, Term::Variable(_)) => true,
            (Term::Atom(a), Term::Atom(b)) => a == b,
            (Term::Compound(f, xs), Term::Compound(g, ys)) => {
                f == g && xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| x.may_match(y))
            }
            _ => false,
        }
    }

    pub fn variables(&self, out: &mut Vec<Symbol>) {
        match self {
            Term::Variable(name) => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            Term::Atom(_) => {}
            Term::Compound(_, args) => args.iter().for_each(|a| a.variables(out)),
        }
    }

    fn occurs(&self, owner: Owner, var: &Symbol, term_owner: Owner, sub: &Substitution) -> bool {
        let (term_owner, term) = sub.walk(term_owner, self);
        match term {
            Term::Variable(name) => term_owner == owner && name == var,
            Term::Atom(_) => false,
            Term::Compound(_, args) => args.iter().any(|a| a.occurs(owner, var, term_owner, sub)),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Variable(name) | Term::Atom(name) => write!(f, "{}", name),
            Term::Compound(functor, args) => {
                write!(f, "{}(", functor)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

struct Parser<'a, 's> {
    label: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    store: &'s mut StringStore,
}

impl Parser<'_, '_> {
    fn error(&self, message: String) -> Error {
        Error::TermParse {
            label: self.label.to_string(),
            message,
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.chars.next();
        }
    }

    fn name(&mut self) -> String {
        let mut name = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if c == '(' || c == ')' || c == ',' || c.is_whitespace() {
                break;
            }
            name.push(c);
            self.chars.next();
        }
        name
    }

    fn term(&mut self) -> Result<Term, Error> {
        self.skip_whitespace();
        let name = self.name();
        if name.is_empty() {
            return Err(self.error("expected a name".to_string()));
        }
        if name == "_" {
            return Ok(Term::Variable(self.store.fresh_variable()));
        }
        if name.starts_with('_') {
            return Ok(Term::Variable(self.store.intern(&name)));
        }
        let functor = self.store.intern(&name);
        if self.chars.peek().map(|&(_, c)| c) != Some('(') {
            return Ok(Term::Atom(functor));
        }
        self.chars.next();
        let mut args = vec![self.term()?];
        loop {
            self.skip_whitespace();
            match self.chars.next() {
                Some((_, ',')) => args.push(self.term()?),
                Some((_, ')')) => break,
                Some((i, c)) => return Err(self.error(format!("unexpected '{}' at {}", c, i))),
                None => return Err(self.error("missing ')'".to_string())),
            }
        }
        Ok(Term::Compound(functor, args))
    }
}

/// Which side of a morphism a term belongs to. Variables of the two sides never alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
    Domain,
    Codomain,
}

/// One substitution shared by every label pair of a morphism.
#[derive(Debug, Clone, Default)]
pub struct Substitution {
    bindings: HashMap<(Owner, Symbol), (Owner, Term)>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    fn walk<'a>(&'a self, mut owner: Owner, mut term: &'a Term) -> (Owner, &'a Term) {
        while let Term::Variable(name) = term {
            match self.bindings.get(&(owner, name.clone())) {
                Some((o, t)) => {
                    owner = *o;
                    term = t;
                }
                None => break,
            }
        }
        (owner, term)
    }

    /// Unify two terms, extending the substitution. On failure the substitution is left
    /// partially extended and should be discarded.
    pub fn unify(&mut self, lhs: (Owner, &Term), rhs: (Owner, &Term)) -> bool {
        let (lo, lt) = self.walk(lhs.0, lhs.1);
        let (ro, rt) = self.walk(rhs.0, rhs.1);
        let (lt, rt) = (lt.clone(), rt.clone());
        match (&lt, &rt) {
            (Term::Variable(a), Term::Variable(b)) if lo == ro && a == b => true,
            (Term::Variable(a), _) => {
                if rt.occurs(lo, a, ro, self) {
                    return false;
                }
                self.bindings.insert((lo, a.clone()), (ro, rt.clone()));
                true
            }
            (_, Term::Variable(b)) => {
                if lt.occurs(ro, b, lo, self) {
                    return false;
                }
                self.bindings.insert((ro, b.clone()), (lo, lt.clone()));
                true
            }
            (Term::Atom(a), Term::Atom(b)) => a == b,
            (Term::Compound(f, xs), Term::Compound(g, ys)) => {
                f == g
                    && xs.len() == ys.len()
                    && xs.iter().zip(ys).all(|(x, y)| self.unify((lo, x), (ro, y)))
            }
            _ => false,
        }
    }

    /// Check the unifier against a relation, given every variable that took part.
    ///
    /// Specialisation allows only domain variables to be instantiated, isomorphism requires a
    /// renaming, unification accepts any unifier.
    pub fn satisfies(
        &self,
        relation: LabelRelation,
        domain_vars: &[Symbol],
        codomain_vars: &[Symbol],
    ) -> bool {
        let must_stay_free: Vec<(Owner, &Symbol)> = match relation {
            LabelRelation::Unification => return true,
            LabelRelation::Specialisation => codomain_vars
                .iter()
                .map(|v| (Owner::Codomain, v))
                .collect(),
            LabelRelation::Isomorphism => domain_vars
                .iter()
                .map(|v| (Owner::Domain, v))
                .chain(codomain_vars.iter().map(|v| (Owner::Codomain, v)))
                .collect(),
        };
        let mut classes: HashMap<(Owner, Symbol), Vec<Owner>> = HashMap::new();
        for (owner, var) in must_stay_free {
            let probe = Term::Variable(var.clone());
            let (root_owner, root) = self.walk(owner, &probe);
            let root = match root {
                Term::Variable(name) => name.clone(),
                _ => return false,
            };
            let members = classes.entry((root_owner, root)).or_insert_with(Vec::new);
            if members.contains(&owner) {
                return false;
            }
            members.push(owner);
        }
        true
    }

    /// Apply the substitution. Free variables are renamed through `rename`.
    pub fn resolve(&self, owner: Owner, term: &Term, rename: &dyn Fn(Owner, &Symbol) -> Symbol) -> Term {
        let (owner, term) = self.walk(owner, term);
        match term {
            Term::Variable(name) => Term::Variable(rename(owner, name)),
            Term::Atom(name) => Term::Atom(name.clone()),
            Term::Compound(functor, args) => Term::Compound(
                functor.clone(),
                args.iter().map(|a| self.resolve(owner, a, rename)).collect(),
            ),
        }
    }
}
