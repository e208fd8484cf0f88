pub mod category;
pub mod priority;
pub mod task;

use serde::{Deserialize, Deserializer};

// Only called when the field is present, so `null` becomes `Some(None)`
// while a missing field falls back to `#[serde(default)]`, i.e. `None`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
