//! `tdlink listen`: stream updates as JSON lines.

use tracing::info;

use super::{Connection, interrupt_on_ctrl_c};
use crate::cli::{GlobalOpts, ListenArgs, OutputFormat};
use crate::config::Session;
use crate::error::CliError;
use crate::output;

pub async fn handle(args: ListenArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let session = Session::load(global)?;
    let interrupt = interrupt_on_ctrl_c();

    let connection = Connection::authorized(&session, global, &args.auth, &interrupt).await?;
    let mut listener = connection.client.listener();
    output::print_note("Listening for updates (Ctrl-C to stop)", global.color);

    let mut seen = 0usize;
    let result = loop {
        if args.count.is_some_and(|limit| seen >= limit) {
            break Ok(());
        }
        let update = tokio::select! {
            biased;
            () = interrupt.cancelled() => break Ok(()),
            update = listener.recv() => update,
        };
        let Some(update) = update else {
            info!("update stream ended");
            break Ok(());
        };
        seen += 1;
        // One update per line regardless of --output.
        let line = output::render_json(&*update, OutputFormat::JsonCompact);
        if let Err(e) = output::print_output(&line) {
            break Err(CliError::from(e));
        }
    };

    listener.close();
    connection.finish().await;
    result
}
