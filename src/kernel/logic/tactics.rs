//! The primitive tactics.
//!
//! Every tactic here is a rule of the sequent calculus run through the
//! gate. Tactics taking an `Option<Label>` work on the labelled formula,
//! or on the first formula of the right shape when the label is `None`.
//! A labelled formula of the wrong shape, or a label naming nothing, is
//! an error; finding no formula of the right shape means the tactic does
//! not apply.

use super::conv::{RuleSource, certify};
use super::goal::{Branch, Changes, Node, RuleResult, Tactic, apply_rule};
use super::sequent::{Sequent, Side, Tagged};
use super::tag::{Label, Tag};
use super::Thm;
use crate::kernel::error::{ErrorKind, KResult, KernelError};
use crate::kernel::formula::{Direction, Formula};
use crate::kernel::gtype::TypeSubst;
use crate::kernel::lterm::{
  is_all, is_conj, is_disj, is_exists, is_implies, is_neg, is_true,
  mk_equality,
};
use crate::kernel::rewrite::{Plan, TermPlan};
use crate::kernel::term::Term;

/// Unwrap a result inside a rule. A recoverable failure means the rule
/// does not apply.
macro_rules! attempt {
  ($e:expr) => {
    match $e {
      Ok(v) => v,
      Err(e) if e.is_recoverable() => {
        return Ok(RuleResult::NotApplicable(e));
      },
      Err(e) => return Err(e),
    }
  };
}

fn side_name(side: Side) -> &'static str {
  match side {
    Side::Asm => "assumption",
    Side::Concl => "conclusion",
  }
}

/// Position of the formula to work on, or `None` if no formula fits.
fn select(
  seq: &Sequent,
  side: Side,
  label: Option<&Label>,
  pred: impl Fn(&Formula) -> bool,
  what: &str,
) -> KResult<Option<usize>> {
  let Some(label) = label else {
    return Ok(seq.find(side, pred));
  };
  let i = seq.position(side, label)?;
  let form = &seq.side(side)[i].1;
  if !pred(form) {
    return Err(KernelError::structural(
      format!("{} {label} is not {what}", side_name(side)),
      vec![form.term().clone()],
    ));
  }
  Ok(Some(i))
}

fn not_found(side: Side, what: &str) -> RuleResult {
  RuleResult::NotApplicable(KernelError::structural(
    format!("no {} is {what}", side_name(side)),
    vec![],
  ))
}

fn single(ticket: &Tag, tyenv: TypeSubst, seq: Sequent, changes: Changes) -> RuleResult {
  let changes = Changes { goals: vec![seq.tag().clone()], ..changes };
  RuleResult::Applied(Branch::new(ticket, tyenv, vec![seq], changes))
}

fn split(ticket: &Tag, tyenv: TypeSubst, seqs: Vec<Sequent>, changes: Changes) -> RuleResult {
  let seqs: Vec<Sequent> = seqs.into_iter().map(Sequent::retagged).collect();
  let changes =
    Changes { goals: seqs.iter().map(|s| s.tag().clone()).collect(), ..changes };
  RuleResult::Applied(Branch::new(ticket, tyenv, seqs, changes))
}

fn tagged(form: Formula) -> (Tag, Tagged) {
  let tag = Tag::fresh();
  (tag.clone(), (tag, form))
}

/// `seq` with the formula at `i` on `side` replaced by `forms`.
fn splice(seq: &Sequent, side: Side, i: usize, forms: Vec<Tagged>) -> Sequent {
  let mut s = seq.clone();
  let v = s.side_mut(side);
  let tail = v.split_off(i + 1);
  v.truncate(i);
  v.extend(forms);
  v.extend(tail);
  s
}

fn form_at(seq: &Sequent, side: Side, i: usize) -> &Tagged {
  &seq.side(side)[i]
}

// ============================================================================
// Propositional rules
// ============================================================================

/// `A /\ B, G |- D` becomes `A, B, G |- D`.
pub fn conj_a(label: Option<Label>) -> impl Tactic {
  move |node: &Node| {
    apply_rule("conj_a", node, |ticket, seq, tyenv| {
      let pred = |f: &Formula| is_conj(f.term());
      let Some(i) = select(seq, Side::Asm, label.as_ref(), pred, "a conjunction")?
      else {
        return Ok(not_found(Side::Asm, "a conjunction"));
      };
      let (a, b) = form_at(seq, Side::Asm, i).1.dest_conj()?;
      let (ta, a) = tagged(a);
      let (tb, b) = tagged(b);
      let s = splice(seq, Side::Asm, i, vec![a, b]);
      let changes = Changes { asms: vec![ta, tb], ..Changes::default() };
      Ok(single(ticket, tyenv.clone(), s, changes))
    })
  }
}

/// `G |- A /\ B, D` becomes `G |- A, D` and `G |- B, D`.
pub fn conj_c(label: Option<Label>) -> impl Tactic {
  move |node: &Node| {
    apply_rule("conj_c", node, |ticket, seq, tyenv| {
      let pred = |f: &Formula| is_conj(f.term());
      let Some(i) =
        select(seq, Side::Concl, label.as_ref(), pred, "a conjunction")?
      else {
        return Ok(not_found(Side::Concl, "a conjunction"));
      };
      let (a, b) = form_at(seq, Side::Concl, i).1.dest_conj()?;
      let (ta, a) = tagged(a);
      let (tb, b) = tagged(b);
      let seqs = vec![
        splice(seq, Side::Concl, i, vec![a]),
        splice(seq, Side::Concl, i, vec![b]),
      ];
      let changes = Changes { concls: vec![ta, tb], ..Changes::default() };
      Ok(split(ticket, tyenv.clone(), seqs, changes))
    })
  }
}

/// `A \/ B, G |- D` becomes `A, G |- D` and `B, G |- D`.
pub fn disj_a(label: Option<Label>) -> impl Tactic {
  move |node: &Node| {
    apply_rule("disj_a", node, |ticket, seq, tyenv| {
      let pred = |f: &Formula| is_disj(f.term());
      let Some(i) = select(seq, Side::Asm, label.as_ref(), pred, "a disjunction")?
      else {
        return Ok(not_found(Side::Asm, "a disjunction"));
      };
      let (a, b) = form_at(seq, Side::Asm, i).1.dest_disj()?;
      let (ta, a) = tagged(a);
      let (tb, b) = tagged(b);
      let seqs = vec![
        splice(seq, Side::Asm, i, vec![a]),
        splice(seq, Side::Asm, i, vec![b]),
      ];
      let changes = Changes { asms: vec![ta, tb], ..Changes::default() };
      Ok(split(ticket, tyenv.clone(), seqs, changes))
    })
  }
}

/// `G |- A \/ B, D` becomes `G |- A, B, D`.
pub fn disj_c(label: Option<Label>) -> impl Tactic {
  move |node: &Node| {
    apply_rule("disj_c", node, |ticket, seq, tyenv| {
      let pred = |f: &Formula| is_disj(f.term());
      let Some(i) =
        select(seq, Side::Concl, label.as_ref(), pred, "a disjunction")?
      else {
        return Ok(not_found(Side::Concl, "a disjunction"));
      };
      let (a, b) = form_at(seq, Side::Concl, i).1.dest_disj()?;
      let (ta, a) = tagged(a);
      let (tb, b) = tagged(b);
      let s = splice(seq, Side::Concl, i, vec![a, b]);
      let changes = Changes { concls: vec![ta, tb], ..Changes::default() };
      Ok(single(ticket, tyenv.clone(), s, changes))
    })
  }
}

/// `A => B, G |- D` becomes `G |- A, D` and `B, G |- D`.
pub fn impl_a(label: Option<Label>) -> impl Tactic {
  move |node: &Node| {
    apply_rule("impl_a", node, |ticket, seq, tyenv| {
      let pred = |f: &Formula| is_implies(f.term());
      let Some(i) =
        select(seq, Side::Asm, label.as_ref(), pred, "an implication")?
      else {
        return Ok(not_found(Side::Asm, "an implication"));
      };
      let (a, b) = form_at(seq, Side::Asm, i).1.dest_implies()?;
      let (ta, a) = tagged(a);
      let (tb, b) = tagged(b);
      let mut left = splice(seq, Side::Asm, i, vec![]);
      left.side_mut(Side::Concl).insert(0, a);
      let right = splice(seq, Side::Asm, i, vec![b]);
      let changes =
        Changes { asms: vec![tb], concls: vec![ta], ..Changes::default() };
      Ok(split(ticket, tyenv.clone(), vec![left, right], changes))
    })
  }
}

/// `G |- A => B, D` becomes `A, G |- B, D`.
pub fn impl_c(label: Option<Label>) -> impl Tactic {
  move |node: &Node| {
    apply_rule("impl_c", node, |ticket, seq, tyenv| {
      let pred = |f: &Formula| is_implies(f.term());
      let Some(i) =
        select(seq, Side::Concl, label.as_ref(), pred, "an implication")?
      else {
        return Ok(not_found(Side::Concl, "an implication"));
      };
      let (a, b) = form_at(seq, Side::Concl, i).1.dest_implies()?;
      let (ta, a) = tagged(a);
      let (tb, b) = tagged(b);
      let mut s = splice(seq, Side::Concl, i, vec![b]);
      s.side_mut(Side::Asm).insert(0, a);
      let changes =
        Changes { asms: vec![ta], concls: vec![tb], ..Changes::default() };
      Ok(single(ticket, tyenv.clone(), s, changes))
    })
  }
}

/// `~A, G |- D` becomes `G |- A, D`.
pub fn neg_a(label: Option<Label>) -> impl Tactic {
  move |node: &Node| {
    apply_rule("neg_a", node, |ticket, seq, tyenv| {
      let pred = |f: &Formula| is_neg(f.term());
      let Some(i) = select(seq, Side::Asm, label.as_ref(), pred, "a negation")?
      else {
        return Ok(not_found(Side::Asm, "a negation"));
      };
      let a = form_at(seq, Side::Asm, i).1.dest_neg()?;
      let (ta, a) = tagged(a);
      let mut s = splice(seq, Side::Asm, i, vec![]);
      s.side_mut(Side::Concl).insert(0, a);
      let changes = Changes { concls: vec![ta], ..Changes::default() };
      Ok(single(ticket, tyenv.clone(), s, changes))
    })
  }
}

/// `G |- ~A, D` becomes `A, G |- D`.
pub fn neg_c(label: Option<Label>) -> impl Tactic {
  move |node: &Node| {
    apply_rule("neg_c", node, |ticket, seq, tyenv| {
      let pred = |f: &Formula| is_neg(f.term());
      let Some(i) = select(seq, Side::Concl, label.as_ref(), pred, "a negation")?
      else {
        return Ok(not_found(Side::Concl, "a negation"));
      };
      let a = form_at(seq, Side::Concl, i).1.dest_neg()?;
      let (ta, a) = tagged(a);
      let mut s = splice(seq, Side::Concl, i, vec![]);
      s.side_mut(Side::Asm).insert(0, a);
      let changes = Changes { asms: vec![ta], ..Changes::default() };
      Ok(single(ticket, tyenv.clone(), s, changes))
    })
  }
}

/// Close `G |- true, D`.
pub fn true_c(label: Option<Label>) -> impl Tactic {
  move |node: &Node| {
    apply_rule("true_c", node, |_, seq, tyenv| {
      let pred = |f: &Formula| is_true(f.term());
      match select(seq, Side::Concl, label.as_ref(), pred, "true")? {
        Some(_) => Ok(RuleResult::Solved(tyenv.clone())),
        None => Ok(not_found(Side::Concl, "true")),
      }
    })
  }
}

// ============================================================================
// Quantifier rules
// ============================================================================

/// `!x. P x, G |- D` becomes `P w, G |- D` for the witness `w`.
pub fn all_a(witness: Term, label: Option<Label>) -> impl Tactic {
  move |node: &Node| {
    apply_rule("all_a", node, |ticket, seq, tyenv| {
      let pred = |f: &Formula| is_all(f.term());
      let Some(i) =
        select(seq, Side::Asm, label.as_ref(), pred, "universally quantified")?
      else {
        return Ok(not_found(Side::Asm, "universally quantified"));
      };
      let (tag, form) = form_at(seq, Side::Asm, i);
      let (inst, tyenv) =
        attempt!(Formula::inst(seq.scope(), tyenv, form, &witness));
      let s = splice(seq, Side::Asm, i, vec![(tag.clone(), inst)]);
      let changes = Changes { asms: vec![tag.clone()], ..Changes::default() };
      Ok(single(ticket, tyenv, s, changes))
    })
  }
}

/// `G |- ?x. P x, D` becomes `G |- P w, D` for the witness `w`.
pub fn exist_c(witness: Term, label: Option<Label>) -> impl Tactic {
  move |node: &Node| {
    apply_rule("exist_c", node, |ticket, seq, tyenv| {
      let pred = |f: &Formula| is_exists(f.term());
      let Some(i) = select(
        seq,
        Side::Concl,
        label.as_ref(),
        pred,
        "existentially quantified",
      )?
      else {
        return Ok(not_found(Side::Concl, "existentially quantified"));
      };
      let (tag, form) = form_at(seq, Side::Concl, i);
      let (inst, tyenv) =
        attempt!(Formula::inst(seq.scope(), tyenv, form, &witness));
      let s = splice(seq, Side::Concl, i, vec![(tag.clone(), inst)]);
      let changes = Changes { concls: vec![tag.clone()], ..Changes::default() };
      Ok(single(ticket, tyenv, s, changes))
    })
  }
}

/// Instantiate the quantifier at `i` on `side` with a new skolem
/// constant.
fn skolemize(
  ticket: &Tag,
  seq: &Sequent,
  tyenv: &TypeSubst,
  side: Side,
  i: usize,
) -> KResult<RuleResult> {
  let (tag, form) = form_at(seq, side, i).clone();
  let Some((b, _)) = form.term().dest_qnt() else {
    return Err(KernelError::structural("not a quantified formula", vec![
      form.term().clone(),
    ]));
  };
  let mut s = seq.clone();
  let c = s.env_mut().new_skolem(b.name(), b.ty());
  let inst = form.inst_skolem(&c)?;
  s.side_mut(side)[i] = (tag.clone(), inst);
  let changes = match side {
    Side::Asm => Changes { asms: vec![tag], consts: vec![c], ..Changes::default() },
    Side::Concl => {
      Changes { concls: vec![tag], consts: vec![c], ..Changes::default() }
    },
  };
  Ok(single(ticket, tyenv.clone(), s, changes))
}

/// `G |- !x. P x, D` becomes `G |- P c, D` for a new constant `c`.
pub fn all_c(label: Option<Label>) -> impl Tactic {
  move |node: &Node| {
    apply_rule("all_c", node, |ticket, seq, tyenv| {
      let pred = |f: &Formula| is_all(f.term());
      let Some(i) =
        select(seq, Side::Concl, label.as_ref(), pred, "universally quantified")?
      else {
        return Ok(not_found(Side::Concl, "universally quantified"));
      };
      skolemize(ticket, seq, tyenv, Side::Concl, i)
    })
  }
}

/// `?x. P x, G |- D` becomes `P c, G |- D` for a new constant `c`.
pub fn exist_a(label: Option<Label>) -> impl Tactic {
  move |node: &Node| {
    apply_rule("exist_a", node, |ticket, seq, tyenv| {
      let pred = |f: &Formula| is_exists(f.term());
      let Some(i) = select(
        seq,
        Side::Asm,
        label.as_ref(),
        pred,
        "existentially quantified",
      )?
      else {
        return Ok(not_found(Side::Asm, "existentially quantified"));
      };
      skolemize(ticket, seq, tyenv, Side::Asm, i)
    })
  }
}

// ============================================================================
// Closing and cutting
// ============================================================================

/// Close `A, G |- B, D` where `A` and `B` are alpha-equal once weak type
/// variables are bound. Without labels every pair is tried.
pub fn basic(asm: Option<Label>, concl: Option<Label>) -> impl Tactic {
  move |node: &Node| {
    apply_rule("basic", node, |_, seq, tyenv| {
      let asms: Vec<usize> = match &asm {
        Some(l) => vec![seq.position(Side::Asm, l)?],
        None => (0..seq.asms().len()).collect(),
      };
      let concls: Vec<usize> = match &concl {
        Some(l) => vec![seq.position(Side::Concl, l)?],
        None => (0..seq.concls().len()).collect(),
      };
      let mut last = None;
      for &i in &asms {
        for &j in &concls {
          let a = &seq.asms()[i].1;
          let c = &seq.concls()[j].1;
          match Formula::alpha_equals_weak(tyenv, a, c) {
            Ok(env) => return Ok(RuleResult::Solved(env)),
            Err(e) if e.is_recoverable() => last = Some(e),
            Err(e) => return Err(e),
          }
        }
      }
      let err = last.unwrap_or_else(|| {
        KernelError::unify("no assumption matches a conclusion", vec![])
      });
      Ok(RuleResult::NotApplicable(err))
    })
  }
}

/// Add the statement of `thm` as an assumption, its outer universal
/// quantifiers instantiated with `witnesses`.
pub fn cut(witnesses: Vec<Term>, thm: Thm) -> impl Tactic {
  move |node: &Node| {
    apply_rule("cut", node, |ticket, seq, tyenv| {
      thm.check_valid(seq.scope())?;
      let mut form = thm.formula().to_weak();
      let mut tyenv = tyenv.clone();
      for w in &witnesses {
        if !is_all(form.term()) {
          return Err(KernelError::structural(
            "more witnesses than universal quantifiers",
            vec![thm.term().clone()],
          ));
        }
        (form, tyenv) = attempt!(Formula::inst(seq.scope(), &tyenv, &form, w));
      }
      let (tag, form) = tagged(form);
      let mut s = seq.clone();
      s.side_mut(Side::Asm).insert(0, form);
      let changes = Changes { asms: vec![tag], ..Changes::default() };
      Ok(single(ticket, tyenv, s, changes))
    })
  }
}

// ============================================================================
// Rewriting
// ============================================================================

/// Add the assumption `t = t'` where `t'` is `t` rewritten by `plan`
/// with the rules of `srcs`.
pub fn rewrite_intro(
  srcs: Vec<RuleSource>,
  plan: TermPlan,
  t: Term,
) -> impl Tactic {
  move |node: &Node| {
    apply_rule("rewrite_intro", node, |ticket, seq, tyenv| {
      let scope = seq.scope();
      let plan = certify(scope, Some(seq), &srcs, &plan)?;
      let refl = mk_equality(t.clone(), t.clone());
      let (eq, tyenv) = Formula::make_open_in(scope, tyenv, &refl)?;
      let (eq, tyenv) =
        Formula::rewrite(scope, &tyenv, &Plan::subnode(1, plan), &eq)?;
      let (tag, eq) = tagged(eq);
      let mut s = seq.clone();
      s.side_mut(Side::Asm).insert(0, eq);
      let changes = Changes { asms: vec![tag], ..Changes::default() };
      Ok(single(ticket, tyenv, s, changes))
    })
  }
}

fn rewrite_at(
  name: &'static str,
  side: Side,
  srcs: Vec<RuleSource>,
  plan: TermPlan,
  label: Label,
) -> impl Tactic {
  move |node: &Node| {
    apply_rule(name, node, |ticket, seq, tyenv| {
      let i = seq.position(side, &label)?;
      let (tag, form) = form_at(seq, side, i);
      if side == Side::Asm {
        for l in srcs.iter().filter_map(RuleSource::asm_label) {
          if seq.lookup_asm(l)?.0 == *tag {
            return Err(KernelError::structural(
              format!("assumption {label} cannot rewrite itself"),
              vec![form.term().clone()],
            ));
          }
        }
      }
      let plan = certify(seq.scope(), Some(seq), &srcs, &plan)?;
      let (form, tyenv) = Formula::rewrite(seq.scope(), tyenv, &plan, form)?;
      let s = splice(seq, side, i, vec![(tag.clone(), form)]);
      let changes = match side {
        Side::Asm => Changes { asms: vec![tag.clone()], ..Changes::default() },
        Side::Concl => {
          Changes { concls: vec![tag.clone()], ..Changes::default() }
        },
      };
      Ok(single(ticket, tyenv, s, changes))
    })
  }
}

/// Rewrite the assumption `label` in place.
pub fn rewrite_a(srcs: Vec<RuleSource>, plan: TermPlan, label: Label) -> impl Tactic {
  rewrite_at("rewrite_a", Side::Asm, srcs, plan, label)
}

/// Rewrite the conclusion `label` in place.
pub fn rewrite_c(srcs: Vec<RuleSource>, plan: TermPlan, label: Label) -> impl Tactic {
  rewrite_at("rewrite_c", Side::Concl, srcs, plan, label)
}

fn subst_at(
  name: &'static str,
  side: Side,
  eqs: Vec<Label>,
  target: Label,
  dir: Direction,
) -> impl Tactic {
  move |node: &Node| {
    apply_rule(name, node, |ticket, seq, tyenv| {
      let i = seq.position(side, &target)?;
      let (tag, form) = form_at(seq, side, i);
      let mut forms = Vec::with_capacity(eqs.len());
      for l in &eqs {
        let (etag, eq) = seq.lookup_asm(l)?;
        if side == Side::Asm && etag == tag {
          return Err(KernelError::structural(
            format!("assumption {target} cannot be substituted into itself"),
            vec![form.term().clone()],
          ));
        }
        forms.push(eq.clone());
      }
      let (form, tyenv) =
        match Formula::subst_equiv(seq.scope(), tyenv, &forms, form, dir) {
          Ok(r) => r,
          Err(e) if e.kind() == ErrorKind::Rewrite => {
            return Ok(RuleResult::NotApplicable(e));
          },
          Err(e) => return Err(e),
        };
      let s = splice(seq, side, i, vec![(tag.clone(), form)]);
      let changes = match side {
        Side::Asm => Changes { asms: vec![tag.clone()], ..Changes::default() },
        Side::Concl => {
          Changes { concls: vec![tag.clone()], ..Changes::default() }
        },
      };
      Ok(single(ticket, tyenv, s, changes))
    })
  }
}

/// Substitute with the equations among the assumptions `eqs` in the
/// assumption `target`.
pub fn subst_a(eqs: Vec<Label>, target: Label, dir: Direction) -> impl Tactic {
  subst_at("subst_a", Side::Asm, eqs, target, dir)
}

/// Substitute with the equations among the assumptions `eqs` in the
/// conclusion `target`.
pub fn subst_c(eqs: Vec<Label>, target: Label, dir: Direction) -> impl Tactic {
  subst_at("subst_c", Side::Concl, eqs, target, dir)
}

// ============================================================================
// Structural rules
// ============================================================================

fn name_at(
  rule: &'static str,
  side: Side,
  label: Label,
  name: String,
) -> impl Tactic {
  move |node: &Node| {
    apply_rule(rule, node, |ticket, seq, tyenv| {
      let i = seq.position(side, &label)?;
      if seq.is_name_used(&name) {
        return Err(KernelError::structural(
          format!("name {name} is already used"),
          vec![],
        ));
      }
      let tag = Tag::named(&name);
      let form = form_at(seq, side, i).1.clone();
      let s = splice(seq, side, i, vec![(tag.clone(), form)]);
      let changes = match side {
        Side::Asm => Changes { asms: vec![tag], ..Changes::default() },
        Side::Concl => Changes { concls: vec![tag], ..Changes::default() },
      };
      Ok(single(ticket, tyenv.clone(), s, changes))
    })
  }
}

/// Give the assumption `label` the name `name`.
pub fn name_a(label: Label, name: &str) -> impl Tactic {
  name_at("name_a", Side::Asm, label, name.to_string())
}

/// Give the conclusion `label` the name `name`.
pub fn name_c(label: Label, name: &str) -> impl Tactic {
  name_at("name_c", Side::Concl, label, name.to_string())
}

fn delete_at(rule: &'static str, side: Side, label: Label) -> impl Tactic {
  move |node: &Node| {
    apply_rule(rule, node, |ticket, seq, tyenv| {
      let i = seq.position(side, &label)?;
      let s = splice(seq, side, i, vec![]);
      Ok(single(ticket, tyenv.clone(), s, Changes::default()))
    })
  }
}

pub fn delete_a(label: Label) -> impl Tactic {
  delete_at("delete_a", Side::Asm, label)
}

pub fn delete_c(label: Label) -> impl Tactic {
  delete_at("delete_c", Side::Concl, label)
}

fn copy_at(rule: &'static str, side: Side, label: Label) -> impl Tactic {
  move |node: &Node| {
    apply_rule(rule, node, |ticket, seq, tyenv| {
      let i = seq.position(side, &label)?;
      let (tag, form) = tagged(form_at(seq, side, i).1.clone());
      let mut s = seq.clone();
      s.side_mut(side).insert(0, form);
      let changes = match side {
        Side::Asm => Changes { asms: vec![tag], ..Changes::default() },
        Side::Concl => Changes { concls: vec![tag], ..Changes::default() },
      };
      Ok(single(ticket, tyenv.clone(), s, changes))
    })
  }
}

/// Duplicate the assumption `label` under a new tag, in front.
pub fn copy_a(label: Label) -> impl Tactic {
  copy_at("copy_a", Side::Asm, label)
}

/// Duplicate the conclusion `label` under a new tag, in front.
pub fn copy_c(label: Label) -> impl Tactic {
  copy_at("copy_c", Side::Concl, label)
}

fn lift_at(rule: &'static str, side: Side, label: Label) -> impl Tactic {
  move |node: &Node| {
    apply_rule(rule, node, |ticket, seq, tyenv| {
      let i = seq.position(side, &label)?;
      let mut s = seq.clone();
      let form = s.side_mut(side).remove(i);
      s.side_mut(side).insert(0, form);
      Ok(single(ticket, tyenv.clone(), s, Changes::default()))
    })
  }
}

/// Move the assumption `label` to the front.
pub fn lift_a(label: Label) -> impl Tactic {
  lift_at("lift_a", Side::Asm, label)
}

/// Move the conclusion `label` to the front.
pub fn lift_c(label: Label) -> impl Tactic {
  lift_at("lift_c", Side::Concl, label)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::kernel::error::ErrorKind;
  use crate::kernel::gtype::Gtype;
  use crate::kernel::ident::Ident;
  use crate::kernel::logic::goal::{Goal, apply_to_each, apply_to_goal};
  use crate::kernel::lterm::{mk_all, mk_and, mk_ex, mk_implies, mk_not, mk_or};
  use crate::kernel::logic::conv::plan_rewrite;
  use crate::kernel::rewrite::Control;
  use crate::kernel::scope::Scope;

  fn scope() -> Scope {
    let mut scp = Scope::base().open_theory("tac").unwrap();
    for n in ["p", "q"] {
      scp.declare(Ident::new("tac", n), Gtype::bool()).unwrap();
    }
    let pred = Gtype::fun(Gtype::num(), Gtype::bool());
    scp.declare(Ident::new("tac", "f"), pred).unwrap();
    scp
  }

  fn p() -> Term {
    Term::id(Ident::new("tac", "p"), Gtype::bool())
  }

  fn q() -> Term {
    Term::id(Ident::new("tac", "q"), Gtype::bool())
  }

  fn f(x: Term) -> Term {
    let ty = Gtype::fun(Gtype::num(), Gtype::bool());
    Term::app(Term::id(Ident::new("tac", "f"), ty), x)
  }

  fn goal(scp: &Scope, t: Term) -> Goal {
    Goal::new(scp, Formula::make(scp, &t).unwrap()).unwrap()
  }

  fn run(tac: impl Tactic, g: &Goal) -> Goal {
    apply_to_goal(tac, g).unwrap().applied().unwrap()
  }

  #[test]
  fn conjunction_commutes() {
    let scp = scope();
    let g = goal(&scp, mk_implies(mk_and(p(), q()), mk_and(q(), p())));
    let g = run(impl_c(None), &g);
    let g = run(conj_a(None), &g);
    assert_eq!(g.subgoals()[0].asms().len(), 2);
    let g = run(conj_c(None), &g);
    assert_eq!(g.subgoals().len(), 2);
    let g = g
      .apply(|b| apply_to_each(basic(None, None), b))
      .unwrap()
      .applied()
      .unwrap();
    let thm = g.to_theorem().unwrap();
    assert_eq!(thm.term(), &mk_implies(mk_and(p(), q()), mk_and(q(), p())));
  }

  #[test]
  fn disjunction_and_negation() {
    let scp = scope();
    // |- p \/ ~p
    let g = goal(&scp, mk_or(p(), mk_not(p())));
    let g = run(disj_c(None), &g);
    assert_eq!(g.subgoals()[0].concls().len(), 2);
    let g = run(neg_c(None), &g);
    let g = run(basic(None, None), &g);
    assert!(g.is_solved());

    // p \/ q, ~q |- p
    let t = mk_implies(mk_and(mk_or(p(), q()), mk_not(q())), p());
    let g = run(conj_a(None), &run(impl_c(None), &goal(&scp, t)));
    let g = run(neg_a(None), &g);
    let g = run(disj_a(None), &g);
    assert_eq!(g.subgoals().len(), 2);
    let g = g
      .apply(|b| apply_to_each(basic(None, None), b))
      .unwrap()
      .applied()
      .unwrap();
    assert!(g.to_theorem().is_ok());
  }

  #[test]
  fn modus_ponens() {
    let scp = scope();
    let t = mk_implies(mk_and(p(), mk_implies(p(), q())), q());
    let g = run(conj_a(None), &run(impl_c(None), &goal(&scp, t)));
    let g = run(impl_a(None), &g);
    assert_eq!(g.subgoals().len(), 2);
    let g = g
      .apply(|b| apply_to_each(basic(None, None), b))
      .unwrap()
      .applied()
      .unwrap();
    assert!(g.is_solved());
  }

  #[test]
  fn labels_and_applicability() {
    let scp = scope();
    let g = goal(&scp, mk_implies(p(), q()));
    let step = apply_to_goal(conj_c(None), &g).unwrap();
    assert!(!step.is_applied());
    let err = apply_to_goal(conj_c(Some(Label::Index(1))), &g).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structural);
    let err = apply_to_goal(impl_c(Some(Label::Index(2))), &g).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structural);
    assert!(!apply_to_goal(basic(None, None), &g).unwrap().is_applied());
    assert!(!apply_to_goal(true_c(None), &g).unwrap().is_applied());
  }

  #[test]
  fn quantifiers() {
    let scp = scope();
    // (!x. f x) => ?y. f y
    let t = mk_implies(
      mk_all("x", Gtype::num(), f),
      mk_ex("y", Gtype::num(), f),
    );
    let g = run(impl_c(None), &goal(&scp, t));
    let g = run(all_a(Term::mk_num(1), None), &g);
    let g = run(exist_c(Term::mk_num(1), None), &g);
    let g = run(basic(None, None), &g);
    assert!(g.to_theorem().is_ok());

    // Witnesses must have the binder's type.
    let t = mk_implies(mk_all("x", Gtype::num(), f), f(Term::mk_num(0)));
    let g = run(impl_c(None), &goal(&scp, t));
    let step = apply_to_goal(all_a(Term::mk_bool(true), None), &g).unwrap();
    assert!(!step.is_applied());
  }

  #[test]
  fn skolem_constants() {
    let scp = scope();
    // (?x. f x) => ?y. f y
    let t = mk_implies(mk_ex("x", Gtype::num(), f), mk_ex("y", Gtype::num(), f));
    let g = run(impl_c(None), &goal(&scp, t));
    let g = run(exist_a(None), &g);
    let consts = g.changes().consts().to_vec();
    assert_eq!(consts.len(), 1);
    let c = consts[0].clone();
    assert_eq!(c.binder().unwrap().name(), "_x");
    let g = run(exist_c(c, None), &g);
    let g = run(basic(None, None), &g);
    assert!(g.is_solved());

    // !x. f x cannot be proved from f 0.
    let t = mk_implies(f(Term::mk_num(0)), mk_all("x", Gtype::num(), f));
    let g = run(impl_c(None), &goal(&scp, t));
    let g = run(all_c(None), &g);
    assert!(!apply_to_goal(basic(None, None), &g).unwrap().is_applied());
  }

  #[test]
  fn cut_instantiates_theorem() {
    let scp = scope();
    let ax = Thm::mk_axiom(
      Formula::make(&scp, &mk_all("x", Gtype::num(), f)).unwrap(),
    );
    let g = goal(&scp, f(Term::mk_num(4)));
    let g = run(cut(vec![Term::mk_num(4)], ax.clone()), &g);
    assert_eq!(g.subgoals()[0].asms().len(), 1);
    let g = run(basic(None, None), &g);
    assert!(g.is_solved());

    let g = goal(&scp, f(Term::mk_num(4)));
    let two = vec![Term::mk_num(1), Term::mk_num(2)];
    let err = apply_to_goal(cut(two, ax), &g).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structural);
  }

  #[test]
  fn structural_rules() {
    let scp = scope();
    let t = mk_implies(mk_and(p(), q()), q());
    let g = run(conj_a(None), &run(impl_c(None), &goal(&scp, t)));
    let g = run(name_a(Label::Index(-2), "hq"), &g);
    assert!(g.subgoals()[0].is_name_used("hq"));
    let err = apply_to_goal(name_a(Label::Index(-1), "hq"), &g).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structural);

    let g = run(lift_a(Label::from("hq")), &g);
    assert_eq!(g.subgoals()[0].asms()[0].0.name(), Some("hq"));
    let g = run(copy_a(Label::from("hq")), &g);
    assert_eq!(g.subgoals()[0].asms().len(), 3);
    let g = run(delete_a(Label::from("hq")), &g);
    assert_eq!(g.subgoals()[0].asms().len(), 2);
    let g = run(copy_c(Label::Index(1)), &g);
    let g = run(delete_c(Label::Index(2)), &g);
    let g = run(lift_c(Label::Index(1)), &g);
    let g = run(name_c(Label::Index(1), "goal"), &g);
    let g = run(basic(None, Some(Label::from("goal"))), &g);
    assert!(g.to_theorem().is_ok());
  }

  #[test]
  fn rewriting_with_assumptions() {
    let scp = scope();
    let n = Term::mk_num;
    // 1 = 2 => f 1 => f 2
    let t = mk_implies(
      mk_equality(n(1), n(2)),
      mk_implies(f(n(1)), f(n(2))),
    );
    let g = run(impl_c(None), &goal(&scp, t));
    let g = run(impl_c(None), &g);
    let g = run(name_a(Label::Index(-2), "eq"), &g);

    let srcs = vec![RuleSource::Asm(Label::from("eq"))];
    let seq = g.subgoals()[0].clone();
    let target = seq.asms()[0].1.term().clone();
    let (_, _, plan) = plan_rewrite(
      &Control::default(),
      seq.scope(),
      Some(&seq),
      &srcs,
      g.tyenv(),
      &target,
    )
    .unwrap();
    let err = apply_to_goal(
      rewrite_a(srcs.clone(), plan.clone(), Label::from("eq")),
      &g,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structural);

    let g = run(rewrite_a(srcs, plan, Label::Index(-1)), &g);
    assert_eq!(g.subgoals()[0].asms()[0].1.term(), &f(n(2)));
    let g = run(basic(None, None), &g);
    assert!(g.is_solved());
  }

  #[test]
  fn substitution() {
    let scp = scope();
    let n = Term::mk_num;
    let t = mk_implies(mk_equality(n(1), n(2)), mk_implies(f(n(2)), f(n(1))));
    let g = run(impl_c(None), &goal(&scp, t));
    let g = run(impl_c(None), &g);
    let err = apply_to_goal(
      subst_c(vec![Label::Index(-1)], Label::Index(1), Direction::LeftRight),
      &g,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structural);
    let eqs = vec![Label::Index(-2)];
    let step = apply_to_goal(
      subst_c(eqs.clone(), Label::Index(1), Direction::RightLeft),
      &g,
    )
    .unwrap();
    assert!(!step.is_applied());
    let g = run(subst_c(eqs, Label::Index(1), Direction::LeftRight), &g);
    assert_eq!(g.subgoals()[0].concls()[0].1.term(), &f(n(2)));
    let g = run(basic(None, None), &g);
    assert!(g.is_solved());
  }

  #[test]
  fn rewrite_intro_adds_equation() {
    let scp = scope();
    let n = Term::mk_num;
    let eq = Thm::mk_axiom(Formula::make(&scp, &mk_equality(n(1), n(2))).unwrap());
    let srcs = vec![RuleSource::Thm(eq)];
    let (r, _, plan) = plan_rewrite(
      &Control::default(),
      &scp,
      None,
      &srcs,
      &TypeSubst::new(),
      &f(n(1)),
    )
    .unwrap();
    assert_eq!(r, f(n(2)));
    let g = goal(&scp, mk_equality(f(n(1)), f(n(2))));
    let g = run(rewrite_intro(srcs, plan, f(n(1))), &g);
    let g = run(basic(None, None), &g);
    assert!(g.is_solved());
  }
}
