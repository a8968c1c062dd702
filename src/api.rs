//! 信标管理接口
//!
//! 把已解析的请求体映射为 (状态码, JSON 响应体)，不绑定具体 HTTP 框架：
//! - `POST /beacons/add`      -> 302 + 提示信息
//! - `POST /beacons/remove`   -> 302 + 提示信息
//! - `POST /beacons/position` -> 200 / 400
//! - `GET  /beacons/config`   -> 200
//! - `GET  /beacons/status`   -> 200
//!
//! 输入校验失败返回 422，注册表读写失败返回 500。

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{error, warn};

use crate::algorithms::{BeaconKey, BeaconReading};
use crate::error::{PositioningError, ValidationError};
use crate::positioning::BeaconPositioningService;
use crate::registry::BeaconRepository;

/// 管理页面地址（302 跳转目标）
pub const BEACONS_PAGE: &str = "/beacons";

pub const STATUS_OK: u16 = 200;
pub const STATUS_FOUND: u16 = 302;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_UNPROCESSABLE: u16 = 422;
pub const STATUS_INTERNAL_ERROR: u16 = 500;

/// 无匹配信标时的错误信息
pub const NO_BEACONS_DETECTED: &str = "No registered beacons detected";

/// 添加信标请求
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AddBeaconRequest {
    pub major: i64,
    pub minor: i64,
    pub name: String,
    pub floor_x: f64,
    pub floor_y: f64,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

/// 删除信标请求
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoveBeaconRequest {
    pub major: i64,
    pub minor: i64,
}

/// 定位请求
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionRequest {
    #[serde(default)]
    pub readings: Vec<BeaconReading>,
}

/// 接口响应
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    /// 302 时的跳转地址
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        ApiResponse {
            status: STATUS_OK,
            location: None,
            body,
        }
    }

    /// 跳回管理页面并带上提示信息
    pub fn redirect(flash: impl Into<String>) -> Self {
        ApiResponse {
            status: STATUS_FOUND,
            location: Some(BEACONS_PAGE.to_string()),
            body: json!({ "success": true, "message": flash.into() }),
        }
    }

    pub fn failure(status: u16, message: impl Into<String>) -> Self {
        ApiResponse {
            status,
            location: None,
            body: json!({ "success": false, "error": message.into() }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status < 400
    }
}

impl From<PositioningError> for ApiResponse {
    fn from(err: PositioningError) -> Self {
        match err {
            PositioningError::Validation(e) => {
                warn!(error = %e, "rejected beacon request");
                ApiResponse::failure(STATUS_UNPROCESSABLE, e.to_string())
            }
            PositioningError::Registry(e) => {
                error!(error = %e, "beacon registry failure");
                ApiResponse::failure(STATUS_INTERNAL_ERROR, e.to_string())
            }
        }
    }
}

impl From<ValidationError> for ApiResponse {
    fn from(err: ValidationError) -> Self {
        PositioningError::from(err).into()
    }
}

fn parse_body<T: DeserializeOwned>(body: Value) -> Result<T, ApiResponse> {
    serde_json::from_value(body).map_err(|e| {
        warn!(error = %e, "malformed request body");
        ApiResponse::failure(STATUS_UNPROCESSABLE, format!("请求体格式错误: {e}"))
    })
}

/// 信标管理接口
pub struct BeaconEndpoint<R> {
    service: BeaconPositioningService<R>,
}

impl<R: BeaconRepository> BeaconEndpoint<R> {
    pub fn new(service: BeaconPositioningService<R>) -> Self {
        BeaconEndpoint { service }
    }

    pub fn service(&self) -> &BeaconPositioningService<R> {
        &self.service
    }

    /// `POST /beacons/add`
    pub fn handle_add(&self, body: Value) -> ApiResponse {
        self.try_add(body).unwrap_or_else(|resp| resp)
    }

    fn try_add(&self, body: Value) -> Result<ApiResponse, ApiResponse> {
        let req: AddBeaconRequest = parse_body(body)?;
        let key = BeaconKey::from_wide(req.major, req.minor)?;
        let name = req.name.trim();
        self.service.register_beacon(
            key.major, key.minor, name, req.floor_x, req.floor_y, req.lat, req.lon,
        )?;
        Ok(ApiResponse::redirect(format!("Beacon \"{name}\" ({key}) saved.")))
    }

    /// `POST /beacons/remove`
    pub fn handle_remove(&self, body: Value) -> ApiResponse {
        self.try_remove(body).unwrap_or_else(|resp| resp)
    }

    fn try_remove(&self, body: Value) -> Result<ApiResponse, ApiResponse> {
        let req: RemoveBeaconRequest = parse_body(body)?;
        let key = BeaconKey::from_wide(req.major, req.minor)?;
        self.service.remove_beacon(key.major, key.minor)?;
        Ok(ApiResponse::redirect(format!("Beacon {key} removed.")))
    }

    /// `POST /beacons/position`
    pub fn handle_position(&self, body: Value) -> ApiResponse {
        self.try_position(body).unwrap_or_else(|resp| resp)
    }

    fn try_position(&self, body: Value) -> Result<ApiResponse, ApiResponse> {
        let req: PositionRequest = parse_body(body)?;
        match self.service.calculate_position(&req.readings)? {
            Some(position) => Ok(ApiResponse::ok(json!({
                "success": true,
                "position": position,
            }))),
            None => Ok(ApiResponse::failure(STATUS_BAD_REQUEST, NO_BEACONS_DETECTED)),
        }
    }

    /// `GET /beacons/config`
    pub fn handle_config(&self) -> ApiResponse {
        self.service
            .js_config()
            .map_err(ApiResponse::from)
            .and_then(|config| to_body(&config))
            .map(ApiResponse::ok)
            .unwrap_or_else(|resp| resp)
    }

    /// `GET /beacons/status`
    pub fn handle_status(&self) -> ApiResponse {
        self.service
            .setup_status()
            .map_err(ApiResponse::from)
            .and_then(|status| to_body(&status))
            .map(ApiResponse::ok)
            .unwrap_or_else(|resp| resp)
    }
}

fn to_body<T: Serialize>(value: &T) -> Result<Value, ApiResponse> {
    serde_json::to_value(value)
        .map_err(|e| ApiResponse::failure(STATUS_INTERNAL_ERROR, e.to_string()))
}
