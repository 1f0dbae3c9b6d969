use std::fmt;

use num_bigint::BigUint;

use crate::models::tokens::Token;

/// The AMM mechanism variant a pool implements. Only concentrated-liquidity
/// V3 pools are modeled today; the enum exists so new variants extend the
/// marshalling dispatch instead of widening untyped strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    V3,
}

impl Protocol {
    pub const ALL: [Protocol; 1] = [Protocol::V3];

    /// Storage tag. Stored rows and marshalled routes carry this literal.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::V3 => "V3",
        }
    }

    /// Lowercase form used in peer invoke payloads.
    pub fn as_lowercase(&self) -> &'static str {
        match self {
            Protocol::V3 => "v3",
        }
    }

    pub fn from_str(value: &str) -> Option<Protocol> {
        match value {
            "V3" => Some(Protocol::V3),
            _ => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time snapshot of an AMM pool. Built fresh per quote by the pool
/// data providers and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pool {
    pub token0: Token,
    pub token1: Token,
    /// Fee tier in hundredths of a basis point (e.g. 3000 = 0.30%).
    pub fee: u32,
    /// Square-root price as a Q64.96 fixed-point value.
    pub sqrt_ratio_x96: BigUint,
    pub liquidity: BigUint,
    pub tick_current: i32,
}

impl Pool {
    /// Orders the pair by address so that `token0 < token1`, matching the
    /// on-chain pool layout regardless of the order the caller passed.
    pub fn new(
        token_a: Token,
        token_b: Token,
        fee: u32,
        sqrt_ratio_x96: BigUint,
        liquidity: BigUint,
        tick_current: i32,
    ) -> Self {
        let (token0, token1) = if token_a.address <= token_b.address {
            (token_a, token_b)
        } else {
            (token_b, token_a)
        };
        Pool {
            token0,
            token1,
            fee,
            sqrt_ratio_x96,
            liquidity,
            tick_current,
        }
    }

    pub fn involves(&self, token: &Token) -> bool {
        self.token0.equals(token) || self.token1.equals(token)
    }

    /// The other side of the pair, if `token` is one of the two.
    pub fn counterpart(&self, token: &Token) -> Option<&Token> {
        if self.token0.equals(token) {
            Some(&self.token1)
        } else if self.token1.equals(token) {
            Some(&self.token0)
        } else {
            None
        }
    }
}

impl fmt::Display for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.token0.address, self.token1.address, self.fee
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(address: &str) -> Token {
        Token::new(1, address, 18)
    }

    #[test]
    fn constructor_orders_tokens_by_address() {
        let low = token("0x0000000000000000000000000000000000000001");
        let high = token("0x0000000000000000000000000000000000000002");
        let pool = Pool::new(
            high.clone(),
            low.clone(),
            3000,
            BigUint::from(1u8),
            BigUint::from(1u8),
            0,
        );
        assert!(pool.token0.equals(&low));
        assert!(pool.token1.equals(&high));
    }

    #[test]
    fn counterpart_resolves_both_sides() {
        let a = token("0x0000000000000000000000000000000000000001");
        let b = token("0x0000000000000000000000000000000000000002");
        let c = token("0x0000000000000000000000000000000000000003");
        let pool = Pool::new(
            a.clone(),
            b.clone(),
            500,
            BigUint::from(1u8),
            BigUint::from(1u8),
            0,
        );
        assert!(pool.counterpart(&a).unwrap().equals(&b));
        assert!(pool.counterpart(&b).unwrap().equals(&a));
        assert!(pool.counterpart(&c).is_none());
    }
}
