//! Domain models shared by the repositories, the reconciler and the routes.

pub mod form;
pub mod session;

pub use form::{Form, FormDraft, FormField, FormInput, FormInputError, FormSummary};
pub use session::{ShopSession, select_session};
