//! DNS MX resolution.
//!
//! [`resolve_mail_exchangers`] turns a domain into the ordered list of hosts a
//! probe should contact; [`check_mx`] does the same with the system resolver.

mod error;
mod resolver;
mod types;

pub use error::MxError as Error;
pub use resolver::{LookupMx, SystemResolver, check_mx, resolve_mail_exchangers};
pub use types::{MxRecord, MxStatus};

pub(crate) use resolver::resolve_with;
