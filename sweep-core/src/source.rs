//! # Value Sources
//!
//! One unit of input value in a sweep batch: which asset, how much, and the
//! route it takes to the target asset.

use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Native currency or a fungible token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Asset {
    Native,
    Token(Address),
}

impl Asset {
    pub fn is_native(&self) -> bool {
        matches!(self, Asset::Native)
    }

    /// Address the asset is routed as on an exchange. Native value routes
    /// through its wrapper token.
    pub fn route_address(&self, wrapped_native: Address) -> Address {
        match self {
            Asset::Native => wrapped_native,
            Asset::Token(address) => *address,
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Native => write!(f, "native"),
            Asset::Token(address) => write!(f, "token {:?}", address),
        }
    }
}

/// How much of a source to convert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestedAmount {
    Exact(U256),
    /// Full caller balance for tokens, leftover supplied value for native.
    Remainder,
}

impl RequestedAmount {
    pub fn exact(&self) -> Option<U256> {
        match self {
            RequestedAmount::Exact(amount) => Some(*amount),
            RequestedAmount::Remainder => None,
        }
    }

    pub fn is_remainder(&self) -> bool {
        matches!(self, RequestedAmount::Remainder)
    }
}

/// Raw amounts follow the wire convention: zero means "resolve at settlement".
impl From<U256> for RequestedAmount {
    fn from(amount: U256) -> Self {
        if amount.is_zero() {
            RequestedAmount::Remainder
        } else {
            RequestedAmount::Exact(amount)
        }
    }
}

/// Ordered hops from the input asset to the target asset.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConversionPath(SmallVec<[Address; 4]>);

impl ConversionPath {
    pub fn new(hops: impl IntoIterator<Item = Address>) -> Self {
        hops.into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<Address> {
        self.0.first().copied()
    }

    pub fn last(&self) -> Option<Address> {
        self.0.last().copied()
    }

    pub fn as_slice(&self) -> &[Address] {
        &self.0
    }

    /// Consecutive `(from, to)` pairs along the path.
    pub fn hops(&self) -> impl Iterator<Item = (Address, Address)> + '_ {
        self.0.windows(2).map(|pair| (pair[0], pair[1]))
    }
}

impl FromIterator<Address> for ConversionPath {
    fn from_iter<I: IntoIterator<Item = Address>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<Address>> for ConversionPath {
    fn from(hops: Vec<Address>) -> Self {
        Self(SmallVec::from_vec(hops))
    }
}

/// A single batch entry. Immutable for the duration of one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueSource {
    pub asset: Asset,
    pub requested: RequestedAmount,
    pub path: ConversionPath,
    pub min_output: U256,
}

impl ValueSource {
    pub fn native(amount: impl Into<U256>, path: ConversionPath, min_output: U256) -> Self {
        Self {
            asset: Asset::Native,
            requested: RequestedAmount::from(amount.into()),
            path,
            min_output,
        }
    }

    pub fn token(
        token: Address,
        amount: impl Into<U256>,
        path: ConversionPath,
        min_output: U256,
    ) -> Self {
        Self {
            asset: Asset::Token(token),
            requested: RequestedAmount::from(amount.into()),
            path,
            min_output,
        }
    }

    /// The native entry that absorbs whatever supplied value is left over.
    pub fn is_deferred(&self) -> bool {
        self.asset.is_native() && self.requested.is_remainder()
    }
}
