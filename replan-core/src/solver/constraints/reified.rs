use crate::solver::constraints::Propagation;
use crate::solver::store::{Store, VarId};
use crate::solver::{Cause, Contradiction, PropagationResult};

/// `b ⇔ x = k`, with `b` a boolean variable
#[derive(Debug, Clone)]
pub struct ReifiedEq {
    b: VarId,
    x: VarId,
    k: i64,
}

impl ReifiedEq {
    pub fn new(b: VarId, x: VarId, k: i64) -> Self {
        Self { b, x, k }
    }

    pub(crate) fn vars(&self) -> Vec<VarId> {
        vec![self.b, self.x]
    }

    pub(crate) fn propagate(&self, store: &mut Store) -> PropagationResult {
        match store.value(self.b) {
            Some(1) => {
                if !store.contains(self.x, self.k) {
                    return Err(Contradiction::on_var(self.x, Cause::Inconsistent));
                }
                store.instantiate(self.x, self.k)?;
                return Ok(Propagation::Entailed);
            }
            Some(_) => {
                if store.value(self.x) == Some(self.k) {
                    return Err(Contradiction::on_var(self.x, Cause::Inconsistent));
                }
                store.remove_value(self.x, self.k)?;
                return Ok(Propagation::Entailed);
            }
            None => {}
        }

        if !store.contains(self.x, self.k) {
            store.instantiate(self.b, 0)?;
            Ok(Propagation::Entailed)
        } else if store.value(self.x) == Some(self.k) {
            store.instantiate(self.b, 1)?;
            Ok(Propagation::Entailed)
        } else {
            Ok(Propagation::Active)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::store::VarKind;

    #[test]
    fn test_fixed_boolean_disagreeing_with_variable() {
        let mut store = Store::new();
        let b = store.new_bool("b");
        let x = store.new_interval("x", VarKind::Hoster, 0, 3);
        store.instantiate(x, 1).unwrap();
        store.instantiate(b, 1).unwrap();
        let err = ReifiedEq::new(b, x, 2).propagate(&mut store).unwrap_err();
        assert_eq!(err.cause, Cause::Inconsistent);
    }

    #[test]
    fn test_variable_side_decides_boolean() {
        let mut store = Store::new();
        let b = store.new_bool("b");
        let x = store.new_interval("x", VarKind::Hoster, 0, 3);
        let c = ReifiedEq::new(b, x, 2);
        assert_eq!(c.propagate(&mut store), Ok(Propagation::Active));
        store.instantiate(x, 2).unwrap();
        assert_eq!(c.propagate(&mut store), Ok(Propagation::Entailed));
        assert_eq!(store.value(b), Some(1));
    }

    #[test]
    fn test_false_boolean_removes_value() {
        let mut store = Store::new();
        let b = store.new_bool("b");
        let x = store.new_interval("x", VarKind::Hoster, 0, 3);
        store.instantiate(b, 0).unwrap();
        ReifiedEq::new(b, x, 0).propagate(&mut store).unwrap();
        assert_eq!(store.lb(x), 1);
    }
}
