//! Calling guest exports.
//!
//! Completion and input exports are optional and their exact integer/float types are up to the
//! guest toolchain, so calls go through the untyped [`Func::call`] with each [`Arg`] coerced to
//! the declared parameter type.

use crate::bridge::{Arg, GuestCall};

use anyhow::{Result, bail};
use wasmtime::{AsContextMut, Func, FuncType, Instance, Val, ValType};

/// Convert `arg` to a value of type `ty`.
pub fn coerce(arg: Arg, ty: &ValType) -> Result<Val> {
    let val = match (ty, arg) {
        (ValType::I32, Arg::I32(v)) => Val::I32(v),
        (ValType::I32, Arg::U32(v)) => Val::I32(v as i32),
        (ValType::I32, Arg::F32(v)) => Val::I32(v as i32),
        (ValType::I32, Arg::F64(v)) => Val::I32(v as i32),
        (ValType::I64, Arg::I32(v)) => Val::I64(i64::from(v)),
        (ValType::I64, Arg::U32(v)) => Val::I64(i64::from(v)),
        (ValType::I64, Arg::F32(v)) => Val::I64(v as i64),
        (ValType::I64, Arg::F64(v)) => Val::I64(v as i64),
        (ValType::F32, Arg::I32(v)) => Val::F32((v as f32).to_bits()),
        (ValType::F32, Arg::U32(v)) => Val::F32((v as f32).to_bits()),
        (ValType::F32, Arg::F32(v)) => Val::F32(v.to_bits()),
        (ValType::F32, Arg::F64(v)) => Val::F32((v as f32).to_bits()),
        (ValType::F64, Arg::I32(v)) => Val::F64(f64::from(v).to_bits()),
        (ValType::F64, Arg::U32(v)) => Val::F64(f64::from(v).to_bits()),
        (ValType::F64, Arg::F32(v)) => Val::F64(f64::from(v).to_bits()),
        (ValType::F64, Arg::F64(v)) => Val::F64(v.to_bits()),
        (other, _) => bail!("cannot pass {arg:?} as {other}"),
    };
    Ok(val)
}

fn alloc_results(ty: &FuncType) -> Result<Vec<Val>> {
    let mut results = Vec::new();
    for val_ty in ty.results() {
        let Some(val) = Val::default_for_ty(&val_ty) else {
            bail!("unsupported export return type: {val_ty:?}");
        };
        results.push(val);
    }
    Ok(results)
}

/// Call `func` with `args` coerced to its signature, returning its results.
pub fn call_func(mut store: impl AsContextMut, func: &Func, args: &[Arg]) -> Result<Vec<Val>> {
    let ty = func.ty(&store);
    if ty.params().len() != args.len() {
        bail!(
            "expected {} parameters, host passes {}",
            ty.params().len(),
            args.len()
        );
    }
    let params = ty
        .params()
        .zip(args)
        .map(|(ty, arg)| coerce(*arg, &ty))
        .collect::<Result<Vec<_>>>()?;
    let mut results = alloc_results(&ty)?;
    func.call(store.as_context_mut(), &params, &mut results)?;
    Ok(results)
}

/// Perform `call` if the guest defines the export.
///
/// Returns `Ok(false)` when the export is missing; the call is dropped with a warning.
pub fn dispatch(mut store: impl AsContextMut, instance: &Instance, call: &GuestCall) -> Result<bool> {
    let Some(func) = instance.get_func(&mut store, call.export) else {
        log::warn!(
            "guest does not export `{}`; dropping call with {:?}",
            call.export,
            call.args
        );
        return Ok(false);
    };
    call_func(&mut store, &func, &call.args)
        .map_err(|e| e.context(format!("calling guest export `{}`", call.export)))?;
    Ok(true)
}

/// Read a scalar pointer-sized result as `u64`.
pub fn val_as_u64(val: &Val) -> Option<u64> {
    match val {
        Val::I32(v) => Some(*v as u32 as u64),
        Val::I64(v) => Some(*v as u64),
        _ => None,
    }
}
