// Copyright (c) 2023 The TQUIC Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error type for congestion control operations.

use strum_macros::EnumIter;

/// Congestion control error.
#[derive(Clone, Debug, PartialEq, Eq, EnumIter)]
pub enum Error {
    /// There is no more work to do.
    Done,

    /// The operation cannot be completed because it was attempted in an
    /// invalid state.
    InvalidState(String),

    /// The configuration is invalid.
    InvalidConfig(String),

    /// I/O error.
    IoError(String),
}

impl Error {
    /// Return the errno-style code of the error.
    pub fn to_errno(&self) -> i32 {
        match self {
            Error::Done => -100,
            Error::InvalidState(_) => -104,
            Error::InvalidConfig(_) => -106,
            Error::IoError(_) => -112,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl std::convert::From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(format!("{}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn error_to_errno() {
        for err in Error::iter() {
            assert!(err.to_errno() < 0);
        }
    }

    #[test]
    fn io_error() {
        use std::error::Error;
        let e = std::io::Error::from(std::io::ErrorKind::UnexpectedEof);
        let e = super::Error::from(e);

        assert_eq!(format!("{}", e), "IoError(\"unexpected end of file\")");
        assert!(e.source().is_none());
    }

    #[test]
    fn invalid_config() {
        let e = Error::InvalidConfig("wave_beta".into());
        assert_eq!(format!("{}", e), "InvalidConfig(\"wave_beta\")");
    }
}
