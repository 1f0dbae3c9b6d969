use serde::{Deserialize, Serialize};

use crate::marshalling::pool::{self, MarshalledPool};
use crate::marshalling::token::{self, MarshalledToken};
use crate::marshalling::MarshalError;
use crate::models::pools::Protocol;
use crate::models::routes::Route;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarshalledRoute {
    pub protocol: String,
    pub input: MarshalledToken,
    pub output: MarshalledToken,
    pub pools: Vec<MarshalledPool>,
}

pub fn marshal(route: &Route) -> MarshalledRoute {
    // Dispatch on the protocol tag so a future variant with a different
    // pool shape grows its own arm instead of reusing this one untyped.
    match route.protocol {
        Protocol::V3 => MarshalledRoute {
            protocol: route.protocol.as_str().to_string(),
            input: token::marshal(&route.input),
            output: token::marshal(&route.output),
            pools: route.pools.iter().map(pool::marshal).collect(),
        },
    }
}

pub fn unmarshal(marshalled: MarshalledRoute) -> Result<Route, MarshalError> {
    let protocol = Protocol::from_str(&marshalled.protocol)
        .ok_or_else(|| MarshalError::UnknownProtocol(marshalled.protocol.clone()))?;

    match protocol {
        Protocol::V3 => {
            let input = token::unmarshal(marshalled.input);
            let output = token::unmarshal(marshalled.output);
            let pools = marshalled
                .pools
                .into_iter()
                .map(pool::unmarshal)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Route::new(protocol, input, output, pools)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use num_bigint::BigUint;

    use super::*;
    use crate::models::pools::Pool;
    use crate::models::tokens::Token;

    fn labeled_token(address: &str, symbol: &str, decimals: u8) -> Token {
        Token::new(1, address, decimals)
            .with_symbol(symbol)
            .with_name(symbol)
    }

    fn sample_route() -> Route {
        let weth = labeled_token("0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2", "WETH", 18);
        let usdt = labeled_token("0xdac17f958d2ee523a2206206994597c13d831ec7", "USDT", 6);
        let usdc = labeled_token("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48", "USDC", 6);
        let first = Pool::new(
            weth.clone(),
            usdt.clone(),
            500,
            BigUint::from_str("1829845065927797685036499738").unwrap(),
            BigUint::from(5_000_000u64),
            -197359,
        );
        let second = Pool::new(
            usdt.clone(),
            usdc.clone(),
            100,
            BigUint::from_str("79228162514264337593543950336").unwrap(),
            BigUint::from(9_000_000u64),
            2,
        );
        Route::new(Protocol::V3, weth, usdc, vec![first, second]).unwrap()
    }

    #[test]
    fn round_trips_multi_hop_route() {
        let route = sample_route();
        assert_eq!(unmarshal(marshal(&route)).unwrap(), route);
    }

    #[test]
    fn refuses_unknown_protocol_tag() {
        let mut marshalled = marshal(&sample_route());
        marshalled.protocol = "V5".to_string();
        match unmarshal(marshalled) {
            Err(MarshalError::UnknownProtocol(tag)) => assert_eq!(tag, "V5"),
            other => panic!("expected UnknownProtocol, got {:?}", other),
        }
    }
}
