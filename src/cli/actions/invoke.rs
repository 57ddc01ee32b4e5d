use crate::{
    APP_USER_AGENT,
    api::{ApiResponse, HttpTransport, RequestDescriptor, Transport},
    challenge::{ChallengeDevices, FileCamera, HttpFaceVerifier, SoftwareBrightness},
    cli::{
        actions::console::ConsoleUi,
        commands::{api, challenge},
    },
    crucial::{ChannelPresenter, CrucialAuthManager, CrucialClient, TriggerPolicy},
    session::{CredentialStore, MemoryCredentialStore},
};
use anyhow::{Context, Result};
use std::{io::Write, sync::Arc};
use tokio::io::{AsyncBufRead, BufReader};
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub api: api::Options,
    pub challenge: challenge::Options,
}

/// Send the privileged request from the terminal and print the response body.
///
/// # Errors
/// Returns an error if the client cannot be configured, the challenge is
/// cancelled, or the request (or its replay) fails.
pub async fn execute(args: Args) -> Result<()> {
    let response = invoke(args, BufReader::new(tokio::io::stdin()), std::io::stderr()).await?;
    println!("{}", serde_json::to_string_pretty(&response.body)?);
    Ok(())
}

/// Wire the client stack, send the request and serve any challenge from `input`.
///
/// # Errors
/// See [`execute`].
pub async fn invoke<R, W>(args: Args, input: R, output: W) -> Result<ApiResponse>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let Args { api, challenge } = args;

    let credentials = Arc::new(MemoryCredentialStore::new());
    if let Some(token) = api.access_token {
        credentials.store(token, api.token_ttl);
    }

    let transport: Arc<dyn Transport> = Arc::new(
        HttpTransport::new(&api.base_url, APP_USER_AGENT, api.request_timeout)
            .context("failed to configure API client")?
            .with_credentials(credentials),
    );

    let (presenter, events) = ChannelPresenter::new();
    let manager = CrucialAuthManager::new(transport.clone(), Arc::new(presenter));
    let client = CrucialClient::new(transport.clone(), manager).with_trigger(TriggerPolicy {
        status: api.trigger_status,
        error_code: api.trigger_error,
    });

    let devices = ChallengeDevices {
        camera: Arc::new(FileCamera::new(challenge.capture)),
        verifier: Arc::new(HttpFaceVerifier::new(transport, challenge.verify_path)),
        brightness: Arc::new(SoftwareBrightness::default()),
    };
    let mut ui = ConsoleUi::new(events, devices, input, output);

    let mut descriptor = RequestDescriptor::new(api.method, api.path);
    if let Some(body) = api.body {
        descriptor = descriptor.with_json(body);
    }
    info!(request_id = %descriptor.id(), "sending privileged request");

    let call = client.send_with_context(descriptor, Some(challenge.context));
    tokio::pin!(call);

    // The UI only stops on its own if the console fails.
    let result = tokio::select! {
        result = &mut call => result,
        ui_result = ui.run() => {
            ui_result.context("challenge UI failed")?;
            call.await
        }
    };

    result.context("privileged request failed")
}
