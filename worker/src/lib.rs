#[macro_use]
extern crate log;

pub mod worker;

/// Shorthand macro to return a new
/// [`TypedError`](walb_worker_core::error::TypedError)
///
/// Allows expressing
///
/// ```no_run
/// # use anyhow::anyhow;
/// # use walb_worker_core::error::{TypedError, TypedResult, SystemError};
/// # fn main() -> TypedResult<()>{
/// let extra_info = "problem";
/// let problem = anyhow!("a {extra_info} description");
/// return Err(TypedError::new(SystemError::Transport, problem));
/// # }
/// ```
///
/// as a more compact
///
/// ```no_run
/// # use walb_worker_core::error::TypedResult;
/// # use walb_worker::problem;
/// # fn main() -> TypedResult<()>{
/// # let extra_info = "problem";
/// problem!(Transport, "a {extra_info} description");
/// # }
/// ```
#[macro_export]
macro_rules! problem {
    ($typed_err: expr, $($tail:tt)*) => {{
        #[allow(unused_imports)]
        use ::walb_worker_core::error::SystemError::*;
        let problem = ::anyhow::anyhow!($($tail)*);
        return ::walb_worker_core::error::TypedResult::Err(
            ::walb_worker_core::error::TypedError::new($typed_err, problem)
        );
    }};
}

#[cfg(test)]
mod test {
    use anyhow::anyhow;
    use walb_worker_core::error::{SystemError, TypedError, TypedResult};

    fn problem_manual() -> TypedResult<()> {
        let extra_info = "problem";
        let problem = anyhow!("a {extra_info} description");
        return Err(TypedError::new(SystemError::Transport, problem));
    }

    fn problem_macro() -> TypedResult<()> {
        let extra_info = "problem";
        problem!(Transport, "a {extra_info} description");
    }

    #[test]
    fn problem() {
        assert_eq!(
            problem_manual().unwrap_err().to_string(),
            problem_macro().unwrap_err().to_string()
        );
    }
}
