use super::engine::Engine;
use crate::error::{ConfigurationError, ControlError};
use crate::pipeline::DescriptorSource;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

pub enum ControlCommand {
    SetPipeline {
        source: DescriptorSource,
        responder: oneshot::Sender<Result<(), ConfigurationError>>,
    },
    GetPipeline {
        responder: oneshot::Sender<Result<String, ConfigurationError>>,
    },
}

/// Client side of the control service. Cheap to clone.
#[derive(Clone)]
pub struct ControlHandle {
    command_tx: mpsc::Sender<ControlCommand>,
}

impl ControlHandle {
    pub async fn set_pipeline(&self, source: DescriptorSource) -> Result<(), ControlError> {
        let (responder, response_rx) = oneshot::channel();
        self.command_tx
            .send(ControlCommand::SetPipeline { source, responder })
            .await
            .map_err(|_| ControlError::ChannelClosed)?;
        Ok(response_rx.await.map_err(|_| ControlError::ChannelClosed)??)
    }

    pub async fn get_pipeline(&self) -> Result<String, ControlError> {
        let (responder, response_rx) = oneshot::channel();
        self.command_tx
            .send(ControlCommand::GetPipeline { responder })
            .await
            .map_err(|_| ControlError::ChannelClosed)?;
        Ok(response_rx.await.map_err(|_| ControlError::ChannelClosed)??)
    }
}

/// Start the control service for `engine`. Commands are applied one at a
/// time, so concurrent reconfigurations never interleave.
pub fn spawn(engine: Engine, capacity: usize) -> (JoinHandle<()>, ControlHandle) {
    let (command_tx, mut command_rx) = mpsc::channel::<ControlCommand>(capacity.max(1));
    let cancel_token = engine.cancellation_token();
    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                command = command_rx.recv() => match command {
                    Some(command) => handle_command(&engine, command).await,
                    None => break,
                },
            }
        }
        info!("Control service stopped.");
    });
    (task, ControlHandle { command_tx })
}

async fn handle_command(engine: &Engine, command: ControlCommand) {
    match command {
        ControlCommand::SetPipeline { source, responder } => {
            debug!("SET_PIPELINE {:?}", source);
            let result = engine.set_pipeline(source).await;
            if let Err(e) = &result {
                error!("Failed to set pipeline: {}", e);
            }
            let _ = responder.send(result);
        }
        ControlCommand::GetPipeline { responder } => {
            let _ = responder.send(engine.get_pipeline_yaml());
        }
    }
}
