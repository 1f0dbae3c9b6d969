use std::str::FromStr;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::marshalling::token::{self, MarshalledToken};
use crate::marshalling::MarshalError;
use crate::models::pools::Pool;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarshalledPool {
    pub token0: MarshalledToken,
    pub token1: MarshalledToken,
    pub fee: u32,
    /// Exceeds u64; stored as a decimal string.
    pub sqrt_ratio_x96: String,
    pub liquidity: String,
    pub tick_current: i32,
}

pub fn marshal(pool: &Pool) -> MarshalledPool {
    MarshalledPool {
        token0: token::marshal(&pool.token0),
        token1: token::marshal(&pool.token1),
        fee: pool.fee,
        sqrt_ratio_x96: pool.sqrt_ratio_x96.to_string(),
        liquidity: pool.liquidity.to_string(),
        tick_current: pool.tick_current,
    }
}

pub fn unmarshal(marshalled: MarshalledPool) -> Result<Pool, MarshalError> {
    let sqrt_ratio_x96 = parse_biguint("sqrtRatioX96", &marshalled.sqrt_ratio_x96)?;
    let liquidity = parse_biguint("liquidity", &marshalled.liquidity)?;
    Ok(Pool {
        token0: token::unmarshal(marshalled.token0),
        token1: token::unmarshal(marshalled.token1),
        fee: marshalled.fee,
        sqrt_ratio_x96,
        liquidity,
        tick_current: marshalled.tick_current,
    })
}

fn parse_biguint(field: &'static str, value: &str) -> Result<BigUint, MarshalError> {
    BigUint::from_str(value).map_err(|_| MarshalError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}
