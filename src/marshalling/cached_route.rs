use serde::{Deserialize, Serialize};

use crate::marshalling::route::{self, MarshalledRoute};
use crate::marshalling::MarshalError;
use crate::models::routes::CachedRoute;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarshalledCachedRoute {
    pub route: MarshalledRoute,
    pub percent: u32,
}

pub fn marshal(cached_route: &CachedRoute) -> MarshalledCachedRoute {
    MarshalledCachedRoute {
        route: route::marshal(&cached_route.route),
        percent: cached_route.percent,
    }
}

pub fn unmarshal(marshalled: MarshalledCachedRoute) -> Result<CachedRoute, MarshalError> {
    Ok(CachedRoute {
        route: route::unmarshal(marshalled.route)?,
        percent: marshalled.percent,
    })
}
