//! `launch` and `attach`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use swfdap_core::{AirLaunchInfo, LaunchTarget, NativeError, NativeSession};
use swfdap_platform::device::{PLATFORM_IOS, PLATFORM_IOS_SIMULATOR};
use swfdap_platform::{CommandLauncher, DeviceCommandResult, DeviceTooling, ProcessLauncher};
use swfdap_protocol::message;
use swfdap_protocol::{AttachRequestArguments, LaunchRequestArguments, Request, Response};

use super::{DebugSession, Deferred};
use crate::error::AdapterError;

const LAUNCH_ERROR: &str = "Error launching SWF debug session.";

impl DebugSession {
    pub(super) async fn launch(&mut self, request: &Request) -> Result<Response, AdapterError> {
        self.lifecycle.require_startable("launch")?;
        let args: LaunchRequestArguments = request.parse_arguments()?;

        let program = self.resolve_path(&args.program);
        let is_air = program.to_ascii_lowercase().ends_with(".xml");
        let air = is_air.then(|| AirLaunchInfo {
            profile: args.profile.clone(),
            screen_size: args.screen_size.clone(),
            screen_dpi: args.screen_dpi,
            version_platform: args.version_platform.clone(),
            extdir: args.extdir.as_deref().map(|dir| self.resolve_path(dir)),
            root_directory: args
                .root_directory
                .as_deref()
                .map(|dir| PathBuf::from(self.resolve_path(dir))),
            application_args: args.args.clone().unwrap_or_default(),
        });
        let target = LaunchTarget {
            uri: program.clone(),
            air,
        };

        let runtime_args = args.runtime_args.clone().unwrap_or_default();
        let env = args.env.clone().unwrap_or_default();
        let customized = !runtime_args.is_empty() || !env.is_empty();

        let mut executable = args.runtime_executable.clone();
        if executable.is_none() && (is_air || customized) {
            let found = self.manager.find_runtime(&target);
            if found.is_none() {
                return Ok(runtime_not_found(request, &program));
            }
            executable = found
                .and_then(|runtime| runtime.path)
                .map(|path| path.to_string_lossy().into_owned());
            if customized && executable.is_none() {
                return Ok(runtime_not_found(request, &program));
            }
        } else if executable.is_none() && self.manager.find_runtime(&target).is_none() {
            return Ok(runtime_not_found(request, &program));
        }

        if !self.manager.supports_launch() {
            return Ok(Response::error(
                request,
                message::launch_failed(format!(
                    "{LAUNCH_ERROR} Launching is not supported by this debugger."
                )),
            ));
        }

        let launcher = executable.map(|exe| {
            Arc::new(
                CommandLauncher::new(exe)
                    .with_runtime_args(runtime_args)
                    .with_env(env)
                    .for_air(is_air),
            ) as Arc<dyn ProcessLauncher>
        });

        info!(program = %program, no_debug = args.no_debug, air = is_air, "launch");
        let manager = self.manager.clone();
        if let Err(e) = blocking(move || manager.start_listening()).await? {
            warn!(error = %e, "could not start listening before launch");
            return Ok(Response::error(
                request,
                message::launch_failed(format!("{LAUNCH_ERROR}\n{e}")),
            ));
        }

        let manager = self.manager.clone();
        if args.no_debug {
            let started = tokio::task::spawn_blocking(move || manager.launch_for_run(&target, launcher))
                .await
                .map_err(|e| AdapterError::Join(e.to_string()))?;
            let mut process = match started {
                Ok(process) => process,
                Err(e) => {
                    self.release_listener().await;
                    return Ok(launch_error(request, &e));
                }
            };
            let manager = self.manager.clone();
            if let Err(e) = blocking(move || manager.stop_listening()).await? {
                if let Err(kill) = process.terminate() {
                    warn!(error = %kill, "could not terminate run-only process");
                }
                return Ok(stop_listening_error(request, &e));
            }
            self.state.lock().await.process = Some(process);
            self.lifecycle.start("launch")?;
            self.deferred = Some(Deferred::RunWatcher);
            return Ok(Response::success::<()>(request, None));
        }

        let launched = tokio::task::spawn_blocking(move || manager.launch(&target, launcher))
            .await
            .map_err(|e| AdapterError::Join(e.to_string()))?;
        let native = match launched {
            Ok(native) => native,
            Err(e) => {
                self.release_listener().await;
                return Ok(launch_error(request, &e));
            }
        };

        let bind_target = native.clone();
        if let Err(e) = blocking(move || bind_target.bind()).await? {
            warn!(error = %e, "bind failed after launch");
            terminate_native(native).await;
            self.release_listener().await;
            return Ok(Response::error(
                request,
                message::launch_failed(format!("{LAUNCH_ERROR}\n{e}")),
            ));
        }
        let manager = self.manager.clone();
        if let Err(e) = blocking(move || manager.stop_listening()).await? {
            terminate_native(native).await;
            return Ok(stop_listening_error(request, &e));
        }

        self.install_native(native).await;
        self.lifecycle.start("launch")?;
        self.deferred = Some(Deferred::EventLoop);
        Ok(Response::success::<()>(request, None))
    }

    pub(super) async fn attach(&mut self, request: &Request) -> Result<Response, AdapterError> {
        self.lifecycle.require_startable("attach")?;
        let args: AttachRequestArguments = request.parse_arguments()?;
        info!(connect = args.connect, port = args.port, platform = ?args.platform, "attach");

        if let Some(platform) = args.platform.as_deref() {
            if let Err(text) = self.prepare_device(platform, &args).await {
                return Ok(self.fail_attach(request, text).await);
            }
        }

        let manager = self.manager.clone();
        if let Err(e) = blocking(move || manager.start_listening()).await? {
            return Ok(self.fail_attach(request, format!("Exception in debugger: {e}")).await);
        }

        let manager = self.manager.clone();
        let (connect, port) = (args.connect, args.port);
        let opened = blocking(move || {
            if connect {
                manager.connect(port)
            } else {
                manager.accept()
            }
        })
        .await?;
        let native = match opened {
            Ok(native) => native,
            Err(e) => {
                return Ok(self.fail_attach(request, format!("Exception in debugger: {e}")).await)
            }
        };

        let bind_target = native.clone();
        if let Err(e) = blocking(move || bind_target.bind()).await? {
            warn!(error = %e, "bind failed after attach");
            self.emitter.error_output(format!("Exception in debugger: {e}\n"));
        }
        let manager = self.manager.clone();
        if let Err(e) = blocking(move || manager.stop_listening()).await? {
            self.emitter
                .error_output(format!("Exception in debugger on stop listening:\n{e}\n"));
        }

        self.install_native(native).await;
        self.lifecycle.start("attach")?;
        self.deferred = Some(Deferred::EventLoop);
        Ok(Response::success::<()>(request, None))
    }

    /// Installs, forwards and launches on a mobile device. Returns the
    /// diagnostic of the first failing step.
    async fn prepare_device(
        &mut self,
        platform: &str,
        args: &AttachRequestArguments,
    ) -> Result<(), String> {
        let sdk = args.platform_sdk.as_deref().map(PathBuf::from);

        if let Some(bundle) = args.bundle.as_deref() {
            self.emitter.output("Preparing to install Adobe AIR application...\n");
            if let Some(app_id) = args.application_id.clone() {
                let (platform, sdk) = (platform.to_string(), sdk.clone());
                self.device(move |devices| devices.uninstall(&platform, &app_id, sdk.as_deref()))
                    .await?;
            }
            self.emitter.output("Installing Adobe AIR application...\n");
            let (platform, bundle, sdk) = (platform.to_string(), PathBuf::from(bundle), sdk.clone());
            self.device(move |devices| devices.install(&platform, &bundle, sdk.as_deref()))
                .await?;
        }

        if args.connect {
            let port = args.port;
            self.emitter
                .output(format!("Forwarding port {port} over USB...\n"));
            let owned = platform.to_string();
            self.device(move |devices| devices.forward_port(&owned, port))
                .await?;
            self.state.lock().await.forwarded_port = Some((platform.to_string(), port));
        }

        match args.application_id.clone() {
            Some(app_id) if platform != PLATFORM_IOS => {
                let text = if platform == PLATFORM_IOS_SIMULATOR {
                    "Launching Adobe AIR application on iOS Simulator...\n"
                } else {
                    "Launching Adobe AIR application on device...\n"
                };
                self.emitter.output(text);
                let owned = platform.to_string();
                self.device(move |devices| devices.launch(&owned, &app_id, sdk.as_deref()))
                    .await?;
                self.emitter.output(
                    "\u{1b}[0;92mInstallation and launch completed successfully.\u{1b}[0m\n",
                );
            }
            _ => self.emitter.output(
                "\u{1b}[0;95mDebugger ready to attach. You must launch your application manually on the device.\u{1b}[0m\n",
            ),
        }
        Ok(())
    }

    async fn device<F>(&self, f: F) -> Result<(), String>
    where
        F: FnOnce(&dyn DeviceTooling) -> DeviceCommandResult + Send + 'static,
    {
        let devices = self.devices.clone();
        let outcome = tokio::task::spawn_blocking(move || f(devices.as_ref()))
            .await
            .map_err(|e| e.to_string())?;
        if outcome.success {
            Ok(())
        } else {
            Err(outcome.message)
        }
    }

    /// Reports a failed attach on stderr, releases any forwarded port and
    /// builds the failed response.
    async fn fail_attach(&mut self, request: &Request, text: String) -> Response {
        warn!(message = %text, "attach failed");
        self.emitter.error_output(format!("{text}\n"));
        let forwarded = self.state.lock().await.forwarded_port.take();
        if let Some((platform, port)) = forwarded {
            self.release_port(&platform, port).await;
        }
        Response::error(request, message::launch_failed(text))
    }

    /// Stops the listener opened for a launch that did not go through.
    async fn release_listener(&self) {
        let manager = self.manager.clone();
        match blocking(move || manager.stop_listening()).await {
            Ok(Err(e)) => warn!(error = %e, "could not stop listening"),
            Err(e) => warn!(error = %e, "could not stop listening"),
            Ok(Ok(())) => {}
        }
    }

    async fn install_native(&self, native: Arc<dyn NativeSession>) {
        let mut state = self.state.lock().await;
        state.native = Some(native);
        state.terminated = false;
    }

    /// Resolves a relative launch path against the workspace. URLs and
    /// absolute paths pass through.
    pub(super) fn resolve_path(&self, path: &str) -> String {
        let is_url = path.starts_with("http://") || path.starts_with("https://");
        match self.config.workspace.as_deref() {
            Some(workspace) if !is_url && !Path::new(path).is_absolute() => {
                workspace.join(path).to_string_lossy().into_owned()
            }
            _ => path.to_string(),
        }
    }
}

async fn blocking<T, F>(f: F) -> Result<T, AdapterError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AdapterError::Join(e.to_string()))
}

async fn terminate_native(native: Arc<dyn NativeSession>) {
    if let Err(e) = tokio::task::spawn_blocking(move || native.terminate()).await {
        warn!(error = %e, "failed to terminate native session");
    }
}

fn runtime_not_found(request: &Request, program: &str) -> Response {
    Response::error(
        request,
        message::launch_failed(format!(
            "{LAUNCH_ERROR} Runtime not found for program: {program}"
        )),
    )
}

fn stop_listening_error(request: &Request, error: &NativeError) -> Response {
    warn!(error = %error, "stop listening failed");
    Response::error(
        request,
        message::launch_failed(format!("Exception in debugger on stop listening:\n{error}")),
    )
}

fn launch_error(request: &Request, error: &NativeError) -> Response {
    warn!(error = %error, "launch failed");
    Response::error(request, message::launch_failed(launch_error_text(error)))
}

/// The user-facing text for a failed runtime launch.
pub(crate) fn launch_error_text(error: &NativeError) -> String {
    match error {
        NativeError::Launch {
            exit_code: Some(code),
            message,
            output,
        } => format!("{LAUNCH_ERROR} Process exited with code: {code}\n\n{message}\n\n{output}"),
        NativeError::Launch { message, .. } => format!("{LAUNCH_ERROR}\n{message}"),
        NativeError::FileNotFound(path) => format!("{LAUNCH_ERROR} File not found: {path}"),
        other => format!("{LAUNCH_ERROR}\n{other}"),
    }
}
