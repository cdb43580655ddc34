use serde::Deserialize;

mod category;
mod event;
mod order;
mod user;

pub use category::*;
pub use event::*;
pub use order::*;
pub use user::*;

/// Distinguishes an absent field (None) from an explicit null (Some(None)).
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
