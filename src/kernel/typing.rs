//! Type inference and checking for terms.

use crate::cons_list::ConsList;

use super::error::{ErrorKind, KResult, KernelError};
use super::gtype::{Gtype, GtypeData, TypeSubst, copy_type, unify_env};
use super::scope::Scope;
use super::term::{Binder, Quant, Term, TermData};

fn type_error(msg: String, t: &Term) -> KernelError {
  KernelError::terms(ErrorKind::Type, msg, vec![t.clone()])
}

/// The type of `t` read off its annotations. Identifiers are not looked
/// up and occurrences are not compared with their binders; an
/// application must have a function type after `env`.
pub fn type_of_env(env: &TypeSubst, t: &Term) -> KResult<Gtype> {
  match t.as_data() {
    TermData::Id(_, ty) | TermData::Free(_, ty) => Ok(ty.clone()),
    TermData::Bound(b) | TermData::Meta(b) => Ok(b.ty().clone()),
    TermData::Const(c) => Ok(c.ty()),
    TermData::App(f, _) => {
      let fty = env.mgu(&type_of_env(env, f)?);
      match fty.dest_fun() {
        Some((_, res)) => Ok(res.clone()),
        None => Err(type_error(format!("not a function type: {fty}"), f)),
      }
    },
    TermData::Qnt(b, body) => match b.quant() {
      Quant::Lambda => Ok(Gtype::fun(b.ty().clone(), type_of_env(env, body)?)),
      Quant::All | Quant::Ex | Quant::Meta => Ok(Gtype::bool()),
    },
  }
}

pub fn type_of(t: &Term) -> KResult<Gtype> {
  type_of_env(&TypeSubst::new(), t)
}

/// Check that every constructor in `ty` is defined with the right arity.
pub fn check_type(scope: &Scope, ty: &Gtype) -> KResult<()> {
  match ty.as_data() {
    GtypeData::Var(_) | GtypeData::WeakVar(_) => Ok(()),
    GtypeData::Constr(id, args) => match scope.type_def(id) {
      Some(def) if def.arity == args.len() => {
        args.iter().try_for_each(|a| check_type(scope, a))
      },
      Some(def) => Err(KernelError::type_error(
        format!("{id} expects {} arguments, given {}", def.arity, args.len()),
        vec![ty.clone()],
      )),
      None => Err(KernelError::type_error(
        format!("undefined type constructor {id}"),
        vec![ty.clone()],
      )),
    },
  }
}

fn disagreement(
  record: &Binder,
  b: &Binder,
  t: &Term,
  e: KernelError,
) -> KernelError {
  type_error(
    format!(
      "{} occurs at type {} but is bound at type {}: {e}",
      b.name(),
      b.ty(),
      record.ty()
    ),
    t,
  )
}

fn infer_in(
  scope: &Scope,
  env: &mut TypeSubst,
  ctx: &ConsList<Binder>,
  t: &Term,
) -> KResult<Gtype> {
  match t.as_data() {
    TermData::Id(id, ty) => {
      let declared = scope.typeof_ident(id).ok_or_else(|| {
        KernelError::scope(format!("unknown identifier {id}"), vec![t.clone()])
      })?;
      let inst = copy_type(declared);
      *env = unify_env(env, ty, &inst).map_err(|e| {
        type_error(format!("identifier {id} used at the wrong type: {e}"), t)
      })?;
      Ok(ty.clone())
    },
    TermData::Free(_, ty) => {
      check_type(scope, ty)?;
      Ok(ty.clone())
    },
    TermData::Bound(b) => {
      check_type(scope, b.ty())?;
      let Some(record) = ctx.find(|x| *x == b) else {
        return Err(KernelError::scope("unbound variable", vec![t.clone()]));
      };
      *env = unify_env(env, b.ty(), record.ty())
        .map_err(|e| disagreement(record, b, t, e))?;
      Ok(b.ty().clone())
    },
    // The scope's record lives outside `t`, so its type variables are
    // only tested against the occurrence, never bound in `env`.
    TermData::Meta(b) => {
      check_type(scope, b.ty())?;
      if let Some(record) = scope.find_meta(b.name()).filter(|m| *m == b) {
        unify_env(env, b.ty(), record.ty())
          .map_err(|e| disagreement(record, b, t, e))?;
      }
      Ok(b.ty().clone())
    },
    TermData::Const(c) => Ok(c.ty()),
    TermData::App(f, a) => {
      let fty = infer_in(scope, env, ctx, f)?;
      let aty = infer_in(scope, env, ctx, a)?;
      let res = Gtype::var("r");
      *env = unify_env(env, &fty, &Gtype::fun(aty, res.clone()))
        .map_err(|e| type_error(format!("ill-typed application: {e}"), t))?;
      Ok(res)
    },
    TermData::Qnt(b, body) => {
      check_type(scope, b.ty())?;
      let bty = infer_in(scope, env, &ctx.cons(b.clone()), body)?;
      match b.quant() {
        Quant::Lambda => Ok(Gtype::fun(b.ty().clone(), bty)),
        Quant::All | Quant::Ex | Quant::Meta => {
          *env = unify_env(env, &bty, &Gtype::bool()).map_err(|e| {
            type_error(format!("quantified body is not boolean: {e}"), t)
          })?;
          Ok(Gtype::bool())
        },
      }
    },
  }
}

/// Infer the type of the closed term `t`, extending `env` with the
/// bindings needed to make it well-typed. Identifiers must be declared
/// in `scope`; their annotation must be an instance of the declared type.
/// Every bound occurrence must agree with its quantifier's binder and
/// every meta-variable with the record `scope` holds for it.
pub fn infer(scope: &Scope, env: &mut TypeSubst, t: &Term) -> KResult<Gtype> {
  infer_in(scope, env, &ConsList::new(), t)
}

/// Check that `t` has type `expected`, returning the extended
/// environment.
pub fn typecheck_env(
  scope: &Scope,
  env: &TypeSubst,
  t: &Term,
  expected: &Gtype,
) -> KResult<TypeSubst> {
  let mut env = env.clone();
  let ty = infer(scope, &mut env, t)?;
  unify_env(&env, &ty, expected).map_err(|e| {
    type_error(format!("expected type {expected}, found {}: {e}", env.mgu(&ty)), t)
  })
}

pub fn typecheck(
  scope: &Scope,
  t: &Term,
  expected: &Gtype,
) -> KResult<TypeSubst> {
  typecheck_env(scope, &TypeSubst::new(), t, expected)
}
