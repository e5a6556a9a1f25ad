// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Request orchestrator
//!
//! Drives one tab's request through collection and request pre-scripts, the
//! collection pre-request, header composition, the transport call and the
//! post-scripts. Placeholders are resolved against the environment store at
//! every stage, so a script's environment changes reach the stages after it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

use super::capture::apply_captures;
use super::headers::{compose, HeaderSources};
use super::registry::{RunHandle, RunRegistry, RunState};
use super::settings::Settings;
use crate::console::{CallOrigin, CallOutcome, ConsoleEntry, ConsoleLog, HttpCallRecord};
use crate::error::{Error, Result, ScriptStage};
use crate::http::{CookieJar, CorrelationId, HttpTransport, Transport, TransportRequest};
use crate::js::{Capabilities, ScriptCall, ScriptHttp, ScriptRuntime};
use crate::model::{
    Environment, EnvironmentStore, ExecutionContext, HeaderList, KeyValue, PreRequest,
    RequestSnapshot, ResponseSnapshot, ScriptBody, Tab, TabId,
};
use crate::variables::Resolver;

/// Result of one run
#[derive(Debug, Default, Serialize)]
pub struct RequestOutcome {
    /// Whether the run is still in progress
    pub fetching: bool,
    /// Whether the main call produced a response
    pub fetched: bool,
    #[serde(serialize_with = "error_text")]
    pub error: Option<Error>,
    pub response: Option<ResponseSnapshot>,
}

fn error_text<S: serde::Serializer>(
    error: &Option<Error>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

impl RequestOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs request tabs
pub struct Orchestrator {
    transport: Arc<dyn Transport>,
    environments: Arc<dyn EnvironmentStore>,
    cookies: CookieJar,
    console: ConsoleLog,
    settings: Settings,
    runtime: ScriptRuntime,
    registry: RunRegistry,
}

impl Orchestrator {
    pub fn new(
        transport: Arc<dyn Transport>,
        environments: Arc<dyn EnvironmentStore>,
        settings: Settings,
    ) -> Self {
        Self {
            transport,
            environments,
            cookies: CookieJar::new(),
            console: ConsoleLog::new(),
            runtime: ScriptRuntime::new(settings.script_runtime()),
            settings,
            registry: RunRegistry::new(),
        }
    }

    /// Orchestrator over a reqwest transport built from `settings`
    pub fn from_settings(
        settings: Settings,
        environments: Arc<dyn EnvironmentStore>,
    ) -> Result<Self> {
        let transport = HttpTransport::with_config(settings.http_client())?;
        Ok(Self::new(Arc::new(transport), environments, settings))
    }

    /// Use an existing cookie jar
    pub fn with_cookies(mut self, cookies: CookieJar) -> Self {
        self.cookies = cookies;
        self
    }

    /// Use an existing console log
    pub fn with_console(mut self, console: ConsoleLog) -> Self {
        self.console = console;
        self
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    pub fn console(&self) -> &ConsoleLog {
        &self.console
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Entries recorded for a tab so far
    pub fn console_entries(&self, tab: &TabId) -> Vec<ConsoleEntry> {
        self.console.entries(tab)
    }

    pub fn state(&self, tab: &TabId) -> RunState {
        self.registry.state(tab)
    }

    /// Cancel the tab's run. Returns `false` if nothing was running.
    pub fn cancel(&self, tab: &TabId) -> bool {
        let cancelled = self.registry.cancel(tab, self.transport.as_ref());
        if cancelled {
            info!(%tab, "Run cancelled");
        }
        cancelled
    }

    /// Run a tab's request through the whole pipeline.
    ///
    /// A run already active for the same tab is cancelled first.
    pub async fn run(&self, tab: &Tab) -> RequestOutcome {
        let run = self.registry.begin(&tab.id, self.transport.as_ref());
        let started = Instant::now();
        info!(tab = %tab.id, method = %tab.request.method, url = %tab.request.url, "Run started");

        let mut outcome = RequestOutcome::default();
        match self.pipeline(tab, &run, &mut outcome).await {
            Ok(()) => {
                run.finish(RunState::Completed);
                info!(tab = %tab.id, elapsed_ms = started.elapsed().as_millis() as u64, "Run completed");
            }
            Err(error) => {
                if !is_logged(&error) {
                    self.console
                        .append(&tab.id, ConsoleEntry::error(error.to_string(), None));
                }
                let state = if error.is_cancelled() {
                    RunState::Cancelled
                } else {
                    RunState::Failed
                };
                run.finish(state);
                warn!(tab = %tab.id, error = %error, "Run failed");
                outcome.error = Some(error);
            }
        }
        outcome
    }

    async fn pipeline(
        &self,
        tab: &Tab,
        run: &RunHandle,
        outcome: &mut RequestOutcome,
    ) -> Result<()> {
        let definition = &tab.request;
        let collection = tab.collection.as_ref();
        let console = self.console.sink(&tab.id);
        let script_http = ScriptCalls {
            orchestrator: self,
            tab: &tab.id,
            run,
        };
        let capabilities = Capabilities {
            console: &console,
            http: &script_http,
        };

        // Kept unresolved; each stage resolves against the current environment
        let mut request = RequestSnapshot::from_definition(definition);

        let pre_scripts = [
            (
                ScriptStage::CollectionPre,
                collection.and_then(|c| c.pre_script.as_deref()),
            ),
            (ScriptStage::RequestPre, definition.pre_script.as_deref()),
        ];
        for (stage, script) in pre_scripts {
            let Some(script) = script.filter(|s| !s.trim().is_empty()) else {
                continue;
            };
            let environment = self.environments.active();
            let resolver =
                Resolver::new(&definition.path_params, environment.variables.variables());
            let seen = resolver.resolve_request(&request);
            let context = self
                .run_script(stage, script, ExecutionContext::pre(seen), capabilities)
                .await?;
            request = keep_placeholders(&request, &resolver, context.request);
            self.checkpoint(&tab.id, run, &request)?;
        }

        if let Some(pre) = collection
            .and_then(|c| c.pre_request.as_ref())
            .filter(|p| p.is_runnable())
        {
            self.pre_request(&tab.id, run, pre).await?;
            self.checkpoint(&tab.id, run, &request)?;
        }

        let environment = self.environments.active();
        let resolver = Resolver::new(&definition.path_params, environment.variables.variables());
        request = resolver.resolve_request(&request);
        request.headers = compose(
            &request,
            HeaderSources {
                user_agent: self.settings.user_agent.clone(),
                authorization: resolver.resolve_auth(&definition.auth).header_value(),
                cookie: self.cookie_header(&request),
                defaults: self.default_headers(&resolver, collection.map(|c| &c.headers[..]), &environment),
            },
        );

        let response = self
            .dispatch(&tab.id, run, CallOrigin::Main, &request)
            .await?;
        outcome.fetched = true;
        outcome.response = Some(response.clone());

        let post_scripts = [
            (ScriptStage::RequestPost, definition.post_script.as_deref()),
            (
                ScriptStage::CollectionPost,
                collection.and_then(|c| c.post_script.as_deref()),
            ),
        ];
        let mut context = ExecutionContext::post(request, response);
        for (stage, script) in post_scripts {
            let Some(script) = script.filter(|s| !s.trim().is_empty()) else {
                continue;
            };
            context = self
                .run_script(stage, script, context, capabilities)
                .await?;
            outcome.response = context.response.clone();
        }

        Ok(())
    }

    fn default_headers(
        &self,
        resolver: &Resolver<'_>,
        collection: Option<&[KeyValue]>,
        environment: &Environment,
    ) -> Vec<Vec<(String, String)>> {
        vec![
            resolver.resolve_pairs(collection.unwrap_or_default()),
            resolver.resolve_pairs(&environment.headers),
            resolver.resolve_pairs(&self.settings.workspace_headers),
            resolver.resolve_pairs(&self.settings.global_headers),
        ]
    }

    fn cookie_header(&self, request: &RequestSnapshot) -> Option<String> {
        if !self.settings.cookie_management {
            return None;
        }
        let url = request.final_url().ok()?;
        let url = Url::parse(&url).ok()?;
        Some(self.cookies.serialize(&url)).filter(|c| !c.is_empty())
    }

    /// Run one script and flush its environment changes, whatever the outcome
    async fn run_script(
        &self,
        stage: ScriptStage,
        script: &str,
        context: ExecutionContext,
        capabilities: Capabilities<'_>,
    ) -> Result<ExecutionContext> {
        debug!(%stage, "Running script");
        let mut environment = self.environments.active().variables;
        let outcome = self
            .runtime
            .execute(stage, script, context, &mut environment, capabilities)
            .await;
        self.environments.update(environment);
        outcome.into_result(stage, self.runtime.config().timeout)
    }

    /// Stop between stages once the run has been cancelled
    fn checkpoint(&self, tab: &TabId, run: &RunHandle, request: &RequestSnapshot) -> Result<()> {
        if !run.is_cancelled() {
            return Ok(());
        }
        let error = Error::cancelled(&request.url);
        self.console
            .append(tab, ConsoleEntry::error(error.to_string(), None));
        Err(error)
    }

    async fn pre_request(&self, tab: &TabId, run: &RunHandle, pre: &PreRequest) -> Result<()> {
        let environment = self.environments.active();
        let resolver = Resolver::variables_only(environment.variables.variables());
        let mut request = resolver.resolve_request(&pre_request_snapshot(pre));
        request.headers = compose(
            &request,
            HeaderSources {
                user_agent: self.settings.user_agent.clone(),
                cookie: self.cookie_header(&request),
                ..Default::default()
            },
        );

        info!(%tab, method = %request.method, url = %request.url, "Running pre-request");
        let response = self
            .dispatch(tab, run, CallOrigin::PreRequest, &request)
            .await
            .map_err(|e| Error::pre_request(e.to_string()))?;

        // Captures land on the environment as it is after the call
        let mut variables = self.environments.active().variables;
        let found = apply_captures(
            &pre.captures,
            &response,
            &mut variables,
            &self.console.sink(tab),
        );
        self.environments.update(variables);
        debug!(%tab, found, rules = pre.captures.len(), "Pre-request captures applied");
        Ok(())
    }

    /// Send one call and record it in the console.
    ///
    /// The call is tracked by the run so cancelling the tab aborts it.
    async fn dispatch(
        &self,
        tab: &TabId,
        run: &RunHandle,
        origin: CallOrigin,
        snapshot: &RequestSnapshot,
    ) -> Result<ResponseSnapshot> {
        let started = Instant::now();
        let request = match TransportRequest::from_snapshot(snapshot) {
            Ok(request) => {
                request.timeout(Duration::from_millis(self.settings.request_timeout_ms))
            }
            Err(e) => {
                self.record(tab, snapshot, origin, started, None, CallOutcome::Failure {
                    reason: e.to_string(),
                });
                return Err(e);
            }
        };
        let url = request.url_str().to_string();

        let call = run.track(CorrelationId::new(tab));
        let id = call.id().clone();
        let mut cancellation = run.cancellation();
        debug!(%tab, call_id = %id, ?origin, %url, "Dispatching call");

        let result = if run.is_cancelled() {
            Err(Error::cancelled(&url))
        } else {
            tokio::select! {
                result = self.transport.send(&id, request) => result,
                // The registry already told the transport
                _ = cancelled(&mut cancellation) => Err(Error::cancelled(&url)),
            }
        };
        drop(call);

        match result {
            Ok(response) => {
                if self.settings.cookie_management {
                    let stored = self.cookies.merge(&response.headers, &response.url);
                    if stored > 0 {
                        debug!(%tab, stored, "Stored cookies");
                    }
                }
                let snapshot_response = response.to_snapshot();
                self.record(
                    tab,
                    snapshot,
                    origin,
                    started,
                    Some(response.status),
                    CallOutcome::Response {
                        response: snapshot_response.clone(),
                    },
                );
                Ok(snapshot_response)
            }
            Err(e) => {
                let outcome = if e.is_cancelled() {
                    CallOutcome::Cancelled
                } else {
                    CallOutcome::Failure {
                        reason: e.to_string(),
                    }
                };
                self.record(tab, snapshot, origin, started, None, outcome);
                Err(e)
            }
        }
    }

    fn record(
        &self,
        tab: &TabId,
        request: &RequestSnapshot,
        origin: CallOrigin,
        started: Instant,
        status: Option<u16>,
        outcome: CallOutcome,
    ) {
        let url = request.final_url().unwrap_or_else(|_| request.url.clone());
        self.console.append(
            tab,
            ConsoleEntry::HttpCall(HttpCallRecord {
                method: request.method.clone(),
                url,
                status,
                time_ms: started.elapsed().as_millis() as u64,
                request: request.clone(),
                origin,
                outcome,
            }),
        );
    }
}

/// Resolves once the run is cancelled
async fn cancelled(receiver: &mut watch::Receiver<bool>) {
    loop {
        if *receiver.borrow_and_update() {
            return;
        }
        if receiver.changed().await.is_err() {
            // Sender gone: the run can no longer be cancelled
            futures::future::pending::<()>().await;
        }
    }
}

/// Carry a script's edits onto the unresolved request.
///
/// `resolver` is what produced the request the script saw. Entries the
/// script left as they were keep their placeholders, so later stages resolve
/// them against the environment the script produced; edited or added entries
/// are taken literally.
fn keep_placeholders(
    raw: &RequestSnapshot,
    resolver: &Resolver<'_>,
    edited: RequestSnapshot,
) -> RequestSnapshot {
    let url = if edited.url == resolver.resolve(&raw.url) {
        raw.url.clone()
    } else {
        edited.url
    };

    let mut headers = HeaderList::new();
    for entry in edited.headers {
        let original = raw.headers.iter().rev().find(|h| {
            resolver.resolve(&h.name).eq_ignore_ascii_case(&entry.name)
                && resolver.resolve(&h.value) == entry.value
        });
        match original {
            Some(h) => headers.insert(h.name.clone(), h.value.clone()),
            None => headers.insert(entry.name, entry.value),
        }
    }

    let unchanged = |p: &KeyValue, e: &KeyValue| {
        p.enabled == e.enabled
            && resolver.resolve(&p.name) == e.name
            && resolver.resolve(&p.value) == e.value
    };
    let query_params = edited
        .query_params
        .into_iter()
        .enumerate()
        .map(|(i, param)| {
            raw.query_params
                .get(i)
                .filter(|p| unchanged(p, &param))
                .or_else(|| raw.query_params.iter().find(|p| unchanged(p, &param)))
                .cloned()
                .unwrap_or(param)
        })
        .collect();

    let body_unchanged = match (&raw.body, &edited.body) {
        (ScriptBody::None, ScriptBody::None) => true,
        (
            ScriptBody::Raw { content_type, text },
            ScriptBody::Raw {
                content_type: edited_type,
                text: edited_text,
            },
        ) => content_type == edited_type && resolver.resolve(text) == *edited_text,
        _ => false,
    };
    let body = if body_unchanged {
        raw.body.clone()
    } else {
        edited.body
    };

    RequestSnapshot {
        method: edited.method.to_uppercase(),
        url,
        headers,
        query_params,
        body,
    }
}

/// Errors the pipeline has already put in the console
fn is_logged(error: &Error) -> bool {
    error.is_script()
        || matches!(
            error,
            Error::TransportFailure { .. }
                | Error::TransportCancelled { .. }
                | Error::PreRequestFailure { .. }
                | Error::Url(_)
        )
}

fn pre_request_snapshot(pre: &PreRequest) -> RequestSnapshot {
    let method = if pre.method.trim().is_empty() {
        "GET".to_string()
    } else {
        pre.method.trim().to_uppercase()
    };
    RequestSnapshot {
        method,
        url: pre.url.clone(),
        headers: pre
            .headers
            .iter()
            .filter(|h| h.enabled && !h.name.trim().is_empty())
            .map(|h| (h.name.clone(), h.value.clone()))
            .collect(),
        query_params: pre.query_params.clone(),
        body: pre.body.to_script_body(),
    }
}

/// `http.*` calls issued by a tab's scripts
struct ScriptCalls<'a> {
    orchestrator: &'a Orchestrator,
    tab: &'a TabId,
    run: &'a RunHandle,
}

#[async_trait]
impl<'a> ScriptHttp for ScriptCalls<'a> {
    async fn request(&self, call: ScriptCall) -> Result<ResponseSnapshot> {
        let mut request = RequestSnapshot {
            method: call.method,
            url: call.url,
            headers: call.headers,
            query_params: vec![],
            body: match call.body {
                Some(text) => ScriptBody::Raw {
                    content_type: String::new(),
                    text,
                },
                None => ScriptBody::None,
            },
        };
        request.headers = compose(
            &request,
            HeaderSources {
                user_agent: self.orchestrator.settings.user_agent.clone(),
                cookie: self.orchestrator.cookie_header(&request),
                ..Default::default()
            },
        );
        self.orchestrator
            .dispatch(self.tab, self.run, CallOrigin::Script, &request)
            .await
    }
}
