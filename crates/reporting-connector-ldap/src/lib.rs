//! # LDAP Directory Adapters
//!
//! `ldap3`-backed implementations of the directory capabilities:
//!
//! - [`CorporateDirectory`] implements `DirectorySource` (person by mail or alias)
//! - [`AccountDirectory`] implements `AccountSource` (IPA account by username)
//!
//! Both open one LDAPS connection lazily, bind with retry, and reuse it.

pub mod config;
pub mod directory;
pub mod filter;
pub mod ipa;
pub mod session;

pub use config::{AccountDirectoryConfig, CorporateDirectoryConfig, LdapConnection};
pub use directory::CorporateDirectory;
pub use ipa::AccountDirectory;
pub use session::LdapSession;
