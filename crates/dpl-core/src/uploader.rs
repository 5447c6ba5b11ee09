//! Log uploader: resolve a destination, pull the log over scp, send it to Telegram.

use std::{path::PathBuf, sync::Arc};

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::{
    config::UploaderConfig,
    domain::{Destination, MessageRef, ServerDescriptor},
    errors::Error,
    formatting::logs_caption,
    listener::{logs_command_re, wait_for_command},
    messaging::{
        port::MessagingPort,
        types::{DocumentUpload, PollSettings},
    },
    remote::RemoteHost,
    Result,
};

/// How the destination was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Both ids came from configuration.
    Direct,
    /// Learned from an inbound `/logs` command.
    Detected,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadReport {
    pub destination: Destination,
    pub resolution: Resolution,
    pub message: MessageRef,
    /// `Some(true)` when the remote copy was deleted, `None` when not attempted.
    pub remote_deleted: Option<bool>,
}

pub struct LogUploader {
    cfg: UploaderConfig,
    messenger: Arc<dyn MessagingPort>,
    remote: Arc<dyn RemoteHost>,
    poll: PollSettings,
}

impl LogUploader {
    pub fn new(
        cfg: UploaderConfig,
        messenger: Arc<dyn MessagingPort>,
        remote: Arc<dyn RemoteHost>,
    ) -> Self {
        Self {
            cfg,
            messenger,
            remote,
            poll: PollSettings::default(),
        }
    }

    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    /// Resolve the destination once, then upload exactly once.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<UploadReport> {
        println!("📦 Uploading {} logs...", self.cfg.service);
        let server = ServerDescriptor::from_parts(self.cfg.service, &self.cfg.server)?;

        if let Some(dest) = self.cfg.configured_destination() {
            tracing::info!(destination = %dest, "using configured destination");
            let (message, remote_deleted) = self.upload(&server, dest).await?;
            return Ok(UploadReport {
                destination: dest,
                resolution: Resolution::Direct,
                message,
                remote_deleted,
            });
        }

        match self.cfg.listen_timeout {
            Some(t) => println!(
                "👂 No valid chat/topic configured. Send /logs in the target chat or topic (waiting up to {}s)...",
                t.as_secs()
            ),
            None => println!("👂 No valid chat/topic configured. Send /logs in the target chat or topic..."),
        }

        let detected = wait_for_command(
            self.messenger.as_ref(),
            logs_command_re(),
            self.cfg.listen_timeout,
            self.poll,
            cancel,
        )
        .await?;
        let dest = detected.destination;

        let ack = format!("📥 Got it! Uploading {} logs here...", self.cfg.service);
        self.messenger
            .send_text(dest, &ack)
            .await
            .map_err(into_transmit)?;

        match self.upload(&server, dest).await {
            Ok((message, remote_deleted)) => Ok(UploadReport {
                destination: dest,
                resolution: Resolution::Detected,
                message,
                remote_deleted,
            }),
            Err(e) => {
                let note = format!("❌ Failed to upload {} logs: {e}", self.cfg.service);
                if let Err(notify_err) = self.messenger.send_text(dest, &note).await {
                    tracing::warn!(error = %notify_err, "failed to report upload error to chat");
                }
                Err(e)
            }
        }
    }

    /// Download → send → optional remote delete. The temp dir is removed on every path.
    async fn upload(
        &self,
        server: &ServerDescriptor,
        dest: Destination,
    ) -> Result<(MessageRef, Option<bool>)> {
        let temp = tempfile::Builder::new()
            .prefix("dpl-logs-")
            .tempdir_in(&self.cfg.temp_dir)?;
        let local_path = temp.path().join(format!("temp_{}", self.cfg.log_file_name()));

        let outcome = self.transfer_and_send(server, dest, local_path).await;

        let temp_path = temp.path().to_path_buf();
        match temp.close() {
            Ok(()) => tracing::debug!(path = %temp_path.display(), "🗑️ Cleaned up temporary file"),
            Err(e) => tracing::warn!(
                error = %e,
                path = %temp_path.display(),
                "⚠️ Failed to cleanup temporary file"
            ),
        }

        let message = outcome?;

        let remote_deleted = if self.cfg.delete_remote {
            Some(self.delete_remote(server).await)
        } else {
            None
        };
        Ok((message, remote_deleted))
    }

    async fn transfer_and_send(
        &self,
        server: &ServerDescriptor,
        dest: Destination,
        local_path: PathBuf,
    ) -> Result<MessageRef> {
        println!("📥 Downloading logs from {}...", server.host);
        self.remote
            .download(server, &self.cfg.log_file_path, &local_path)
            .await
            .map_err(|e| match e {
                Error::Transfer(_) => e,
                other => Error::Transfer(other.to_string()),
            })?;

        if !tokio::fs::try_exists(&local_path).await.unwrap_or(false) {
            return Err(Error::Transfer(format!(
                "transfer reported success but {} is missing",
                local_path.display()
            )));
        }
        println!("✅ Downloaded logs to: {}", local_path.display());

        let file_name = self.cfg.log_file_name();
        let caption = logs_caption(self.cfg.service, Utc::now(), &server.host, &file_name);

        println!("📤 Uploading to Telegram...");
        let message = self
            .messenger
            .send_document(
                dest,
                DocumentUpload {
                    path: &local_path,
                    file_name: &file_name,
                    caption: &caption,
                },
            )
            .await
            .map_err(into_transmit)?;

        println!("✅ Successfully uploaded logs to Telegram!");
        println!("📱 Message ID: {}", message.message_id.0);
        Ok(message)
    }

    async fn delete_remote(&self, server: &ServerDescriptor) -> bool {
        match self.remote.remove(server, &self.cfg.log_file_path).await {
            Ok(()) => {
                println!("🧹 Removed {} from {}", self.cfg.log_file_path, server.host);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "⚠️ Failed to delete remote log file");
                false
            }
        }
    }
}

fn into_transmit(e: Error) -> Error {
    match e {
        Error::Transmit(_) => e,
        other => Error::Transmit(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        path::Path,
        sync::Mutex,
        time::Duration,
    };

    use async_trait::async_trait;

    use super::*;
    use crate::{
        config::{
            BOT_TOKEN_KEY, CHAT_ID_KEY, FILE_PATH_KEY, SERVICE_NAME_KEY, TOPIC_ID_KEY,
        },
        domain::{ChatId, MessageId, ThreadId},
        messaging::types::IncomingMessage,
    };

    #[derive(Clone, Debug, PartialEq, Eq)]
    enum Sent {
        Text(Destination, String),
        Document(Destination, String, String, bool),
    }

    #[derive(Default)]
    struct FakeMessenger {
        sent: Mutex<Vec<Sent>>,
        polls: Mutex<usize>,
        inbox: Mutex<VecDeque<Vec<IncomingMessage>>>,
        fail_documents: bool,
    }

    impl FakeMessenger {
        fn with_inbox(batches: Vec<Vec<IncomingMessage>>) -> Self {
            Self {
                inbox: Mutex::new(batches.into()),
                ..Default::default()
            }
        }

        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }

        fn polls(&self) -> usize {
            *self.polls.lock().unwrap()
        }

        fn reply(dest: Destination) -> MessageRef {
            MessageRef {
                chat_id: dest.chat_id,
                message_id: MessageId(99),
            }
        }
    }

    #[async_trait]
    impl MessagingPort for FakeMessenger {
        async fn send_text(&self, dest: Destination, text: &str) -> Result<MessageRef> {
            self.sent
                .lock()
                .unwrap()
                .push(Sent::Text(dest, text.to_string()));
            Ok(Self::reply(dest))
        }

        async fn send_document(
            &self,
            dest: Destination,
            doc: DocumentUpload<'_>,
        ) -> Result<MessageRef> {
            if self.fail_documents {
                return Err(Error::Transmit("Bad Request: chat not found".to_string()));
            }
            self.sent.lock().unwrap().push(Sent::Document(
                dest,
                doc.file_name.to_string(),
                doc.caption.to_string(),
                doc.path.exists(),
            ));
            Ok(Self::reply(dest))
        }

        async fn poll_messages(
            &self,
            _offset: i64,
            timeout: Duration,
        ) -> Result<Vec<IncomingMessage>> {
            *self.polls.lock().unwrap() += 1;
            let next = self.inbox.lock().unwrap().pop_front();
            match next {
                Some(batch) => Ok(batch),
                None => {
                    tokio::time::sleep(timeout.max(Duration::from_millis(5))).await;
                    Ok(Vec::new())
                }
            }
        }
    }

    #[derive(Default)]
    struct FakeRemote {
        fail_download: bool,
        skip_write: bool,
        fail_remove: bool,
        downloads: Mutex<Vec<PathBuf>>,
        removals: Mutex<Vec<String>>,
    }

    impl FakeRemote {
        fn last_local_path(&self) -> PathBuf {
            self.downloads.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl RemoteHost for FakeRemote {
        async fn download(
            &self,
            _server: &ServerDescriptor,
            _remote_path: &str,
            local_path: &Path,
        ) -> Result<()> {
            self.downloads
                .lock()
                .unwrap()
                .push(local_path.to_path_buf());
            if self.fail_download {
                // Leave a partial file behind like a half-finished scp would.
                std::fs::write(local_path, b"partial")?;
                return Err(Error::Transfer(
                    "scp exited with exit status: 1: No such file or directory".to_string(),
                ));
            }
            if !self.skip_write {
                std::fs::write(local_path, b"2024-05-01 INFO started\n")?;
            }
            Ok(())
        }

        async fn remove(&self, _server: &ServerDescriptor, remote_path: &str) -> Result<()> {
            if self.fail_remove {
                return Err(Error::External("ssh exited with 255".to_string()));
            }
            self.removals.lock().unwrap().push(remote_path.to_string());
            Ok(())
        }
    }

    fn config(extra: &[(&str, &str)], temp_dir: &Path) -> UploaderConfig {
        let mut env: Vec<(String, String)> = vec![
            (BOT_TOKEN_KEY.into(), "123:abc".into()),
            (SERVICE_NAME_KEY.into(), "api-gateway".into()),
            (FILE_PATH_KEY.into(), "/srv/api/logs/api.log".into()),
            ("API_GATEWAY_SERVER_USER".into(), "deploy".into()),
            ("API_GATEWAY_SERVER_PASSWORD".into(), "pw".into()),
            ("API_GATEWAY_SERVER_HOST".into(), "10.0.0.1".into()),
            ("API_GATEWAY_SERVER_PORT".into(), "22".into()),
            ("LOGS_TEMP_DIR".into(), temp_dir.display().to_string()),
        ];
        env.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        UploaderConfig::from_lookup(move |k| {
            env.iter().find(|(key, _)| key == k).map(|(_, v)| v.clone())
        })
        .unwrap()
    }

    fn fast() -> PollSettings {
        PollSettings {
            long_poll: Duration::from_millis(5),
            error_backoff: Duration::from_millis(1),
        }
    }

    fn incoming(update_id: i64, chat: i64, thread: Option<i32>, text: &str) -> IncomingMessage {
        IncomingMessage {
            update_id,
            chat_id: ChatId(chat),
            thread_id: thread.map(ThreadId),
            username: Some("ops".to_string()),
            text: Some(text.to_string()),
        }
    }

    fn dir_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn direct_path_uploads_without_listening() {
        let tmp = tempfile::tempdir().unwrap();
        let messenger = Arc::new(FakeMessenger::default());
        let remote = Arc::new(FakeRemote::default());
        let cfg = config(&[(CHAT_ID_KEY, "100"), (TOPIC_ID_KEY, "7")], tmp.path());

        let report = LogUploader::new(cfg, messenger.clone(), remote.clone())
            .with_poll_settings(fast())
            .run(&CancellationToken::new())
            .await
            .unwrap();

        let dest = Destination::new(ChatId(100), Some(ThreadId(7)));
        assert_eq!(report.resolution, Resolution::Direct);
        assert_eq!(report.destination, dest);
        assert_eq!(report.remote_deleted, None);
        assert_eq!(messenger.polls(), 0);

        let sent = messenger.sent();
        assert_eq!(sent.len(), 1);
        let Sent::Document(to, name, caption, existed) = &sent[0] else {
            panic!("expected a document");
        };
        assert_eq!(*to, dest);
        assert_eq!(name, "api.log");
        assert!(caption.starts_with("🔧 *API\\-GATEWAY LOGS*"));
        assert!(caption.contains("🖥️ Server: 10\\.0\\.0\\.1"));
        assert!(*existed);

        assert!(!remote.last_local_path().exists());
        assert!(dir_is_empty(tmp.path()));
    }

    #[tokio::test]
    async fn listening_path_resolves_from_logs_command() {
        let tmp = tempfile::tempdir().unwrap();
        let messenger = Arc::new(FakeMessenger::with_inbox(vec![
            vec![incoming(1, 42, None, "good morning")],
            vec![incoming(2, 555, None, "/logs")],
        ]));
        let remote = Arc::new(FakeRemote::default());
        let cfg = config(&[], tmp.path());

        let report = LogUploader::new(cfg, messenger.clone(), remote.clone())
            .with_poll_settings(fast())
            .run(&CancellationToken::new())
            .await
            .unwrap();

        let dest = Destination::new(ChatId(555), None);
        assert_eq!(report.resolution, Resolution::Detected);
        assert_eq!(report.destination, dest);

        let sent = messenger.sent();
        assert_eq!(sent.len(), 2);
        assert!(matches!(&sent[0], Sent::Text(to, text) if *to == dest && text.contains("api-gateway")));
        assert!(matches!(&sent[1], Sent::Document(to, ..) if *to == dest));
        assert!(dir_is_empty(tmp.path()));
    }

    #[tokio::test]
    async fn invalid_configured_ids_fall_back_to_listening() {
        let tmp = tempfile::tempdir().unwrap();
        let messenger = Arc::new(FakeMessenger::with_inbox(vec![vec![incoming(
            5,
            -1009,
            Some(12),
            "/logs",
        )]]));
        let remote = Arc::new(FakeRemote::default());
        let cfg = config(&[(CHAT_ID_KEY, "123"), (TOPIC_ID_KEY, "0")], tmp.path());

        let report = LogUploader::new(cfg, messenger.clone(), remote)
            .with_poll_settings(fast())
            .run(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            report.destination,
            Destination::new(ChatId(-1009), Some(ThreadId(12)))
        );
        assert!(messenger.polls() >= 1);
    }

    #[tokio::test]
    async fn failed_transfer_never_sends_and_leaves_no_temp_file() {
        let tmp = tempfile::tempdir().unwrap();
        let messenger = Arc::new(FakeMessenger::default());
        let remote = Arc::new(FakeRemote {
            fail_download: true,
            ..Default::default()
        });
        let cfg = config(&[(CHAT_ID_KEY, "100"), (TOPIC_ID_KEY, "7")], tmp.path());

        let err = LogUploader::new(cfg, messenger.clone(), remote.clone())
            .run(&CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transfer(_)));
        assert!(messenger.sent().is_empty());
        assert!(!remote.last_local_path().exists());
        assert!(dir_is_empty(tmp.path()));
    }

    #[tokio::test]
    async fn missing_local_file_after_transfer_is_a_transfer_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let messenger = Arc::new(FakeMessenger::default());
        let remote = Arc::new(FakeRemote {
            skip_write: true,
            ..Default::default()
        });
        let cfg = config(&[(CHAT_ID_KEY, "100"), (TOPIC_ID_KEY, "7")], tmp.path());

        let err = LogUploader::new(cfg, messenger.clone(), remote)
            .run(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transfer(ref m) if m.contains("missing")));
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn detected_flow_reports_upload_errors_back_to_chat() {
        let tmp = tempfile::tempdir().unwrap();
        let messenger = Arc::new(FakeMessenger::with_inbox(vec![vec![incoming(
            1, 555, None, "/logs",
        )]]));
        let remote = Arc::new(FakeRemote {
            fail_download: true,
            ..Default::default()
        });
        let cfg = config(&[], tmp.path());

        let err = LogUploader::new(cfg, messenger.clone(), remote)
            .with_poll_settings(fast())
            .run(&CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transfer(_)));
        let sent = messenger.sent();
        assert_eq!(sent.len(), 2);
        assert!(matches!(&sent[1], Sent::Text(_, text) if text.starts_with("❌ Failed to upload")));
    }

    #[tokio::test]
    async fn send_failure_is_a_transmit_error_and_cleans_up() {
        let tmp = tempfile::tempdir().unwrap();
        let messenger = Arc::new(FakeMessenger {
            fail_documents: true,
            ..Default::default()
        });
        let remote = Arc::new(FakeRemote::default());
        let cfg = config(
            &[
                (CHAT_ID_KEY, "100"),
                (TOPIC_ID_KEY, "7"),
                ("LOGS_DELETE_REMOTE", "true"),
            ],
            tmp.path(),
        );

        let err = LogUploader::new(cfg, messenger, remote.clone())
            .run(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transmit(_)));
        assert!(remote.removals.lock().unwrap().is_empty());
        assert!(dir_is_empty(tmp.path()));
    }

    #[tokio::test]
    async fn deletes_remote_copy_when_enabled() {
        let tmp = tempfile::tempdir().unwrap();
        let messenger = Arc::new(FakeMessenger::default());
        let remote = Arc::new(FakeRemote::default());
        let cfg = config(
            &[
                (CHAT_ID_KEY, "100"),
                (TOPIC_ID_KEY, "7"),
                ("LOGS_DELETE_REMOTE", "1"),
            ],
            tmp.path(),
        );

        let report = LogUploader::new(cfg, messenger, remote.clone())
            .run(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.remote_deleted, Some(true));
        assert_eq!(
            remote.removals.lock().unwrap().clone(),
            vec!["/srv/api/logs/api.log".to_string()]
        );
    }

    #[tokio::test]
    async fn remote_delete_failure_does_not_fail_the_run() {
        let tmp = tempfile::tempdir().unwrap();
        let messenger = Arc::new(FakeMessenger::default());
        let remote = Arc::new(FakeRemote {
            fail_remove: true,
            ..Default::default()
        });
        let cfg = config(
            &[
                (CHAT_ID_KEY, "100"),
                (TOPIC_ID_KEY, "7"),
                ("LOGS_DELETE_REMOTE", "true"),
            ],
            tmp.path(),
        );

        let report = LogUploader::new(cfg, messenger, remote)
            .run(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.remote_deleted, Some(false));
    }

    #[tokio::test]
    async fn incomplete_server_config_fails_before_transfer() {
        let tmp = tempfile::tempdir().unwrap();
        let messenger = Arc::new(FakeMessenger::default());
        let remote = Arc::new(FakeRemote::default());
        let mut cfg = config(&[(CHAT_ID_KEY, "100"), (TOPIC_ID_KEY, "7")], tmp.path());
        cfg.server.password = None;
        cfg.server.port = None;

        let err = LogUploader::new(cfg, messenger.clone(), remote.clone())
            .run(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("password, port"));
        assert!(remote.downloads.lock().unwrap().is_empty());
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn incomplete_server_config_fails_before_listening() {
        let tmp = tempfile::tempdir().unwrap();
        let messenger = Arc::new(FakeMessenger::with_inbox(vec![
            vec![incoming(1, 42, None, "chatter")],
            vec![incoming(2, 555, None, "/logs")],
        ]));
        let remote = Arc::new(FakeRemote::default());
        let mut cfg = config(&[], tmp.path());
        cfg.server.password = None;

        let err = LogUploader::new(cfg, messenger.clone(), remote.clone())
            .with_poll_settings(fast())
            .run(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("api-gateway: password"));
        assert_eq!(messenger.polls(), 0);
        assert!(messenger.sent().is_empty());
        assert!(remote.downloads.lock().unwrap().is_empty());
        assert!(dir_is_empty(tmp.path()));
    }

    #[tokio::test]
    async fn cancellation_does_not_abort_a_configured_upload() {
        let tmp = tempfile::tempdir().unwrap();
        let messenger = Arc::new(FakeMessenger::default());
        let remote = Arc::new(FakeRemote::default());
        let cfg = config(&[(CHAT_ID_KEY, "100"), (TOPIC_ID_KEY, "7")], tmp.path());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = LogUploader::new(cfg, messenger.clone(), remote.clone())
            .with_poll_settings(fast())
            .run(&cancel)
            .await
            .unwrap();
        assert_eq!(report.resolution, Resolution::Direct);
        assert_eq!(remote.downloads.lock().unwrap().len(), 1);
        assert_eq!(messenger.sent().len(), 1);
    }
}
