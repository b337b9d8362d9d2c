//! Statically-registered built-in functions for value expressions.
//!
//! The table is fixed at compile time; names and arities are checked by the
//! validation pass before a condition ever evaluates.

use crate::evaluator::error::EvaluationError;

pub struct FunctionDef {
    pub name: &'static str,
    pub min_args: usize,
    /// `None` means variadic above `min_args`.
    pub max_args: Option<usize>,
    apply: fn(&[f64]) -> Result<f64, EvaluationError>,
}

impl FunctionDef {
    pub fn check_arity(&self, count: usize) -> Result<(), EvaluationError> {
        let ok = count >= self.min_args && self.max_args.map_or(true, |max| count <= max);
        if ok {
            Ok(())
        } else {
            Err(EvaluationError::validation(format!(
                "function {} takes {}{} args, got {}",
                self.name,
                self.min_args,
                match self.max_args {
                    Some(max) if max == self.min_args => String::new(),
                    Some(max) => format!("..{max}"),
                    None => "+".to_string(),
                },
                count
            )))
        }
    }

    pub fn apply(&self, args: &[f64]) -> Result<f64, EvaluationError> {
        (self.apply)(args)
    }
}

fn fold_min(args: &[f64]) -> Result<f64, EvaluationError> {
    Ok(args.iter().copied().fold(f64::INFINITY, f64::min))
}

fn fold_max(args: &[f64]) -> Result<f64, EvaluationError> {
    Ok(args.iter().copied().fold(f64::NEG_INFINITY, f64::max))
}

fn fold_sum(args: &[f64]) -> Result<f64, EvaluationError> {
    Ok(args.iter().sum())
}

fn fold_avg(args: &[f64]) -> Result<f64, EvaluationError> {
    Ok(args.iter().sum::<f64>() / args.len() as f64)
}

fn fn_abs(args: &[f64]) -> Result<f64, EvaluationError> {
    Ok(args[0].abs())
}

fn fn_sqrt(args: &[f64]) -> Result<f64, EvaluationError> {
    if args[0] < 0.0 {
        return Err(EvaluationError::Math("sqrt of negative value".to_string()));
    }
    Ok(args[0].sqrt())
}

fn fn_ln(args: &[f64]) -> Result<f64, EvaluationError> {
    if args[0] <= 0.0 {
        return Err(EvaluationError::Math("ln of non-positive value".to_string()));
    }
    Ok(args[0].ln())
}

fn fn_pow(args: &[f64]) -> Result<f64, EvaluationError> {
    Ok(args[0].powf(args[1]))
}

fn fn_floor(args: &[f64]) -> Result<f64, EvaluationError> {
    Ok(args[0].floor())
}

fn fn_ceil(args: &[f64]) -> Result<f64, EvaluationError> {
    Ok(args[0].ceil())
}

fn fn_round(args: &[f64]) -> Result<f64, EvaluationError> {
    Ok(args[0].round())
}

fn fn_clamp(args: &[f64]) -> Result<f64, EvaluationError> {
    let (value, low, high) = (args[0], args[1], args[2]);
    if low > high {
        return Err(EvaluationError::Math("clamp with low > high".to_string()));
    }
    Ok(value.clamp(low, high))
}

pub static BUILT_INS: &[FunctionDef] = &[
    FunctionDef { name: "abs", min_args: 1, max_args: Some(1), apply: fn_abs },
    FunctionDef { name: "min", min_args: 2, max_args: None, apply: fold_min },
    FunctionDef { name: "max", min_args: 2, max_args: None, apply: fold_max },
    FunctionDef { name: "sum", min_args: 1, max_args: None, apply: fold_sum },
    FunctionDef { name: "avg", min_args: 1, max_args: None, apply: fold_avg },
    FunctionDef { name: "sqrt", min_args: 1, max_args: Some(1), apply: fn_sqrt },
    FunctionDef { name: "ln", min_args: 1, max_args: Some(1), apply: fn_ln },
    FunctionDef { name: "pow", min_args: 2, max_args: Some(2), apply: fn_pow },
    FunctionDef { name: "floor", min_args: 1, max_args: Some(1), apply: fn_floor },
    FunctionDef { name: "ceil", min_args: 1, max_args: Some(1), apply: fn_ceil },
    FunctionDef { name: "round", min_args: 1, max_args: Some(1), apply: fn_round },
    FunctionDef { name: "clamp", min_args: 3, max_args: Some(3), apply: fn_clamp },
];

pub fn lookup(name: &str) -> Option<&'static FunctionDef> {
    BUILT_INS.iter().find(|def| def.name == name)
}
