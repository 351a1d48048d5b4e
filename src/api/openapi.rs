//! OpenAPI document for the REST API.

use utoipa::OpenApi;

use crate::api::dto::{
    CommandAccepted, CreateUserRequest, EventListResponse, LinkStatusResponse,
    ManualEntryRequest, UserListResponse,
};
use crate::api::handlers::{events, link, system, users};
use crate::domain::{AccessEvent, Direction, LinkState, LinkStatus, Method, Status, User};
use crate::error::{ErrorBody, ErrorResponse};
use crate::link::LinkDiagnostics;
use crate::service::ClassifierStats;
use crate::ws::messages::{WsMessage, WsMessageType};

/// Generated OpenAPI specification, served at `/api-docs/openapi.json`.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "access-gateway",
        description = "Access-control gateway: badge reads in, classified access events out."
    ),
    paths(
        system::health_handler,
        users::create_user,
        users::list_users,
        users::get_user,
        events::list_events,
        events::get_event,
        events::manual_entry,
        link::link_status,
        link::send_command,
    ),
    components(schemas(
        AccessEvent,
        Direction,
        Method,
        Status,
        User,
        LinkState,
        LinkStatus,
        LinkDiagnostics,
        ClassifierStats,
        CreateUserRequest,
        ManualEntryRequest,
        UserListResponse,
        EventListResponse,
        LinkStatusResponse,
        CommandAccepted,
        ErrorResponse,
        ErrorBody,
        WsMessage,
        WsMessageType,
    )),
    tags(
        (name = "System", description = "Health"),
        (name = "Users", description = "User directory"),
        (name = "Events", description = "Access log and manual entry"),
        (name = "Link", description = "Hardware agent status and remote control"),
    )
)]
pub struct ApiDoc;
