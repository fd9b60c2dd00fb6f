//! `tdlink call`: send one raw request and print the reply.

use tdlink_api::{EngineError, Request};
use tdlink_core::CoreError;

use super::{Connection, interrupt_on_ctrl_c};
use crate::cli::{CallArgs, GlobalOpts};
use crate::config::Session;
use crate::error::CliError;
use crate::output;

pub async fn handle(args: CallArgs, global: &GlobalOpts) -> Result<(), CliError> {
    // Reject bad input before starting a bridge.
    let request = Request::from_json(&args.request)?;
    let kind = request.kind().to_owned();
    let session = Session::load(global)?;

    let connection = if args.no_auth {
        Connection::open(&session, global).await?
    } else {
        let interrupt = interrupt_on_ctrl_c();
        Connection::authorized(&session, global, &args.auth, &interrupt).await?
    };

    let reply = connection.client.call(request).await;
    connection.finish().await;

    let reply = reply?;
    if reply.is_error() {
        let err: EngineError = reply.decode().map_err(|e| {
            CliError::Call(CoreError::UnexpectedResponse {
                request: kind,
                got: "error".into(),
                message: e.to_string(),
            })
        })?;
        return Err(CliError::Engine {
            code: err.code,
            message: err.message,
        });
    }
    output::print_output(&output::render_json(reply.payload(), global.output))?;
    Ok(())
}
