/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;

use anyhow::anyhow;

const USERNAME_MAX_LENGTH: usize = u8::MAX as usize;
const PASSWORD_MAX_LENGTH: usize = u8::MAX as usize;

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Username {
    inner: String,
}

impl Username {
    pub fn from_original(s: &str) -> anyhow::Result<Self> {
        if s.len() > USERNAME_MAX_LENGTH {
            return Err(anyhow!("too long string for a username"));
        }
        if s.contains(':') {
            return Err(anyhow!("colon character is not allowed"));
        }
        Ok(Username {
            inner: s.to_string(),
        })
    }

    /// Decode from the percent-encoded userinfo part of an url.
    pub fn from_encoded(s: &str) -> anyhow::Result<Self> {
        let decoded = percent_encoding::percent_decode_str(s)
            .decode_utf8()
            .map_err(|e| anyhow!("decode failed: {e}"))?;
        Username::from_original(decoded.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn as_original(&self) -> &str {
        &self.inner
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner)
    }
}

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct Password {
    inner: String,
}

impl Password {
    pub fn from_original(s: &str) -> anyhow::Result<Self> {
        if s.len() > PASSWORD_MAX_LENGTH {
            return Err(anyhow!("too long string for a password"));
        }
        Ok(Password {
            inner: s.to_string(),
        })
    }

    pub fn from_encoded(s: &str) -> anyhow::Result<Self> {
        let decoded = percent_encoding::percent_decode_str(s)
            .decode_utf8()
            .map_err(|e| anyhow!("decode failed: {e}"))?;
        Password::from_original(decoded.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn as_original(&self) -> &str {
        &self.inner
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username() {
        assert!(Username::from_original("a:b").is_err());
        let name = Username::from_encoded("user%40example").unwrap();
        assert_eq!(name.as_original(), "user@example");
    }

    #[test]
    fn password() {
        let long = "x".repeat(256);
        assert!(Password::from_original(&long).is_err());
        let pass = Password::from_encoded("p%3Ass").unwrap();
        assert_eq!(pass.as_original(), "p:ss");
        assert_eq!(format!("{pass:?}"), "Password(***)");
    }
}
