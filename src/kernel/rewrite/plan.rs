//! Rewrite plans.
//!
//! A plan says, without doing it, how a node is to be rewritten: which
//! rules to use where and in what order. It is built once by the planner
//! and can be replayed any number of times by the executor.

/// A rewrite plan over keys `K` and rules `R`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Plan<K, R> {
  /// Rewrite the node with each rule in turn.
  Rules(Vec<R>),
  /// Use the plan on every outermost subnode matching the key.
  Keyed(K, Box<Plan<K, R>>),
  /// Use the plan on the subnode at the given position.
  Subnode(usize, Box<Plan<K, R>>),
  /// Use the i-th plan on the i-th subnode.
  Branches(Vec<Plan<K, R>>),
  /// Use each plan on the whole node, left to right.
  Serial(Vec<Plan<K, R>>),
  Skip,
}

impl<K, R> Default for Plan<K, R> {
  fn default() -> Self {
    Plan::Skip
  }
}

impl<K, R> Plan<K, R> {
  pub fn is_skip(&self) -> bool {
    matches!(self, Plan::Skip)
  }

  pub fn rules(rules: Vec<R>) -> Self {
    if rules.is_empty() { Plan::Skip } else { Plan::Rules(rules) }
  }

  pub fn keyed(key: K, plan: Plan<K, R>) -> Self {
    if plan.is_skip() { Plan::Skip } else { Plan::Keyed(key, Box::new(plan)) }
  }

  pub fn subnode(i: usize, plan: Plan<K, R>) -> Self {
    if plan.is_skip() { Plan::Skip } else { Plan::Subnode(i, Box::new(plan)) }
  }

  /// One plan per subnode. A single non-trivial branch becomes a
  /// `Subnode` plan.
  pub fn branches(plans: Vec<Plan<K, R>>) -> Self {
    let active: Vec<usize> = plans
      .iter()
      .enumerate()
      .filter_map(|(i, p)| (!p.is_skip()).then_some(i))
      .collect();
    match active.as_slice() {
      [] => Plan::Skip,
      &[i] => {
        let mut plans = plans;
        Plan::subnode(i, plans.swap_remove(i))
      },
      _ => Plan::Branches(plans),
    }
  }

  pub fn serial(plans: Vec<Plan<K, R>>) -> Self {
    let mut plans: Vec<_> = plans.into_iter().filter(|p| !p.is_skip()).collect();
    match plans.len() {
      0 => Plan::Skip,
      1 => plans.swap_remove(0),
      _ => Plan::Serial(plans),
    }
  }

  /// Every rule of the plan, in the order the executor meets them.
  pub fn all_rules(&self) -> Vec<&R> {
    fn go<'a, K, R>(p: &'a Plan<K, R>, acc: &mut Vec<&'a R>) {
      match p {
        Plan::Rules(rs) => acc.extend(rs.iter()),
        Plan::Keyed(_, p) | Plan::Subnode(_, p) => go(p, acc),
        Plan::Branches(ps) | Plan::Serial(ps) => {
          ps.iter().for_each(|p| go(p, acc))
        },
        Plan::Skip => {},
      }
    }
    let mut acc = Vec::new();
    go(self, &mut acc);
    acc
  }

  /// Replace every rule, keeping the shape of the plan.
  pub fn map<S>(&self, f: &mut impl FnMut(&R) -> S) -> Plan<K, S>
  where
    K: Clone,
  {
    match self {
      Plan::Rules(rs) => Plan::Rules(rs.iter().map(&mut *f).collect()),
      Plan::Keyed(k, p) => Plan::Keyed(k.clone(), Box::new(p.map(f))),
      Plan::Subnode(i, p) => Plan::Subnode(*i, Box::new(p.map(f))),
      Plan::Branches(ps) => Plan::Branches(ps.iter().map(|p| p.map(f)).collect()),
      Plan::Serial(ps) => Plan::Serial(ps.iter().map(|p| p.map(f)).collect()),
      Plan::Skip => Plan::Skip,
    }
  }

  /// `map` with a fallible conversion.
  pub fn try_map<S, E>(
    &self,
    f: &mut impl FnMut(&R) -> Result<S, E>,
  ) -> Result<Plan<K, S>, E>
  where
    K: Clone,
  {
    Ok(match self {
      Plan::Rules(rs) => {
        Plan::Rules(rs.iter().map(&mut *f).collect::<Result<_, _>>()?)
      },
      Plan::Keyed(k, p) => Plan::Keyed(k.clone(), Box::new(p.try_map(f)?)),
      Plan::Subnode(i, p) => Plan::Subnode(*i, Box::new(p.try_map(f)?)),
      Plan::Branches(ps) => Plan::Branches(
        ps.iter().map(|p| p.try_map(f)).collect::<Result<_, _>>()?,
      ),
      Plan::Serial(ps) => {
        Plan::Serial(ps.iter().map(|p| p.try_map(f)).collect::<Result<_, _>>()?)
      },
      Plan::Skip => Plan::Skip,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  type P = Plan<(), u32>;

  #[test]
  fn smart_constructors_drop_skips() {
    assert!(P::rules(vec![]).is_skip());
    assert!(P::subnode(0, Plan::Skip).is_skip());
    assert!(P::branches(vec![Plan::Skip, Plan::Skip]).is_skip());
    assert_eq!(
      P::serial(vec![Plan::Skip, Plan::rules(vec![1]), Plan::Skip]),
      Plan::Rules(vec![1])
    );
  }

  #[test]
  fn single_branch_becomes_subnode() {
    let p = P::branches(vec![Plan::Skip, Plan::rules(vec![7])]);
    assert_eq!(p, Plan::Subnode(1, Box::new(Plan::Rules(vec![7]))));
    let p = P::branches(vec![Plan::rules(vec![1]), Plan::rules(vec![2])]);
    assert!(matches!(p, Plan::Branches(ref ps) if ps.len() == 2));
  }

  #[test]
  fn map_keeps_shape() {
    let p = P::serial(vec![
      Plan::rules(vec![1, 2]),
      Plan::branches(vec![Plan::rules(vec![3]), Plan::rules(vec![4])]),
    ]);
    let q = p.map(&mut |r| r * 10);
    assert_eq!(
      q.all_rules().into_iter().copied().collect::<Vec<_>>(),
      vec![10, 20, 30, 40]
    );
    let err: Result<Plan<(), u32>, &str> =
      p.try_map(&mut |r| if *r == 3 { Err("three") } else { Ok(*r) });
    assert_eq!(err, Err("three"));
  }
}
