//! Type-dispatching value codec
//!
//! Text and raw bytes pass through untouched. Integer, float and boolean
//! scalars are stored as their decimal/boolean text so entries stay readable
//! with `redis-cli`. Every other type goes through MessagePack (named-field
//! maps) by wrapping it in [`Packed`] or implementing the codec with
//! [`msgpack_codec!`](crate::msgpack_codec).
//!
//! Dispatch is resolved at compile time by the destination type's impl, so a
//! decode destination is always a `&mut T`:
//!
//! ```compile_fail
//! use typed_cache::cache::codec::decode_into;
//!
//! let out = String::new();
//! decode_into(b"value", out).unwrap();
//! ```

use super::errors::{CacheError, CacheResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};

/// Encoding half of the codec
pub trait CacheEncode {
    fn encode(&self) -> CacheResult<Vec<u8>>;
}

/// Decoding half of the codec
pub trait CacheDecode: Sized {
    fn decode(bytes: &[u8]) -> CacheResult<Self>;
}

/// Types that can be both stored and read back
pub trait CacheCodec: CacheEncode + CacheDecode {}

impl<T: CacheEncode + CacheDecode> CacheCodec for T {}

/// Encode `value` with the strategy its type selects
pub fn encode<T: CacheEncode + ?Sized>(value: &T) -> CacheResult<Vec<u8>> {
    value.encode()
}

/// Decode `bytes` and assign the result into `out`
///
/// `out` is left untouched when decoding fails.
pub fn decode_into<T: CacheDecode>(bytes: &[u8], out: &mut T) -> CacheResult<()> {
    *out = T::decode(bytes)?;
    Ok(())
}

impl<T: CacheEncode + ?Sized> CacheEncode for &T {
    fn encode(&self) -> CacheResult<Vec<u8>> {
        (**self).encode()
    }
}

impl CacheEncode for str {
    fn encode(&self) -> CacheResult<Vec<u8>> {
        Ok(self.as_bytes().to_vec())
    }
}

impl CacheEncode for String {
    fn encode(&self) -> CacheResult<Vec<u8>> {
        Ok(self.as_bytes().to_vec())
    }
}

impl CacheDecode for String {
    fn decode(bytes: &[u8]) -> CacheResult<Self> {
        String::from_utf8(bytes.to_vec()).map_err(|e| CacheError::Parse {
            type_name: "String",
            value: String::from_utf8_lossy(bytes).into_owned(),
            reason: e.to_string(),
        })
    }
}

impl CacheEncode for [u8] {
    fn encode(&self) -> CacheResult<Vec<u8>> {
        Ok(self.to_vec())
    }
}

impl CacheEncode for Vec<u8> {
    fn encode(&self) -> CacheResult<Vec<u8>> {
        Ok(self.clone())
    }
}

impl CacheDecode for Vec<u8> {
    fn decode(bytes: &[u8]) -> CacheResult<Self> {
        Ok(bytes.to_vec())
    }
}

fn scalar_text<'a>(bytes: &'a [u8], type_name: &'static str) -> CacheResult<&'a str> {
    std::str::from_utf8(bytes).map_err(|e| CacheError::Parse {
        type_name,
        value: String::from_utf8_lossy(bytes).into_owned(),
        reason: e.to_string(),
    })
}

macro_rules! impl_text_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl CacheEncode for $ty {
                fn encode(&self) -> CacheResult<Vec<u8>> {
                    Ok(self.to_string().into_bytes())
                }
            }

            impl CacheDecode for $ty {
                fn decode(bytes: &[u8]) -> CacheResult<Self> {
                    let text = scalar_text(bytes, stringify!($ty))?;
                    text.parse::<$ty>().map_err(|e| CacheError::Parse {
                        type_name: stringify!($ty),
                        value: text.to_string(),
                        reason: e.to_string(),
                    })
                }
            }
        )*
    };
}

impl_text_scalar!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl CacheEncode for bool {
    fn encode(&self) -> CacheResult<Vec<u8>> {
        Ok(self.to_string().into_bytes())
    }
}

impl CacheDecode for bool {
    fn decode(bytes: &[u8]) -> CacheResult<Self> {
        let text = scalar_text(bytes, "bool")?;
        match text {
            "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
            "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
            other => Err(CacheError::Parse {
                type_name: "bool",
                value: other.to_string(),
                reason: "invalid boolean literal".to_string(),
            }),
        }
    }
}

/// Serialize any serde type with MessagePack, keeping field names
pub fn encode_packed<T: Serialize + ?Sized>(value: &T) -> CacheResult<Vec<u8>> {
    rmp_serde::to_vec_named(value).map_err(|source| CacheError::Encode {
        type_name: std::any::type_name::<T>(),
        source,
    })
}

/// Deserialize a MessagePack payload produced by [`encode_packed`]
pub fn decode_packed<T: DeserializeOwned>(bytes: &[u8]) -> CacheResult<T> {
    rmp_serde::from_slice(bytes).map_err(|source| CacheError::Decode {
        type_name: std::any::type_name::<T>(),
        source,
    })
}

/// Wrapper routing a structured value through the MessagePack path
///
/// ```
/// use typed_cache::cache::codec::{CacheDecode, CacheEncode, Packed};
/// use std::collections::HashMap;
///
/// let scores = Packed(HashMap::from([("alice".to_string(), 3u32)]));
/// let bytes = scores.encode().unwrap();
/// let back: Packed<HashMap<String, u32>> = Packed::decode(&bytes).unwrap();
/// assert_eq!(back.0["alice"], 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Packed<T>(pub T);

impl<T> Packed<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> From<T> for Packed<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}

impl<T> Deref for Packed<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for Packed<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T: Serialize> CacheEncode for Packed<T> {
    fn encode(&self) -> CacheResult<Vec<u8>> {
        encode_packed(&self.0)
    }
}

impl<T: DeserializeOwned> CacheDecode for Packed<T> {
    fn decode(bytes: &[u8]) -> CacheResult<Self> {
        decode_packed(bytes).map(Packed)
    }
}

/// Implement the cache codec for serde types through MessagePack
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use typed_cache::cache::codec::{CacheDecode, CacheEncode};
///
/// #[derive(Debug, PartialEq, Serialize, Deserialize)]
/// struct Session {
///     user_id: u64,
///     roles: Vec<String>,
/// }
///
/// typed_cache::msgpack_codec!(Session);
///
/// let session = Session { user_id: 7, roles: vec!["admin".into()] };
/// let bytes = session.encode().unwrap();
/// assert_eq!(Session::decode(&bytes).unwrap(), session);
/// ```
#[macro_export]
macro_rules! msgpack_codec {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::cache::codec::CacheEncode for $ty {
                fn encode(&self) -> $crate::cache::CacheResult<::std::vec::Vec<u8>> {
                    $crate::cache::codec::encode_packed(self)
                }
            }

            impl $crate::cache::codec::CacheDecode for $ty {
                fn decode(bytes: &[u8]) -> $crate::cache::CacheResult<Self> {
                    $crate::cache::codec::decode_packed(bytes)
                }
            }
        )+
    };
}
