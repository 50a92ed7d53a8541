mod traits;

pub use traits::{OAuthFlow, TokenSet};
