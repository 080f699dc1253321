//! CLI command execution.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;

use docchat::api::{ChatApi, HttpApi};
use docchat::channel::{Channel, ChannelEvent, ChatEvent, DocumentEvent, ServerEvent};
use docchat::config::Config;
use docchat::controller::ChatController;
use docchat::credentials::{CredentialProvider, DefaultCredentials};
use docchat::notice::{Notice, Notices};
use docchat::store::{DocumentStore, MessageStore, SessionStore};
use docchat::upload::{
    FileInput, SelectedFile, UploadCoordinator, UploadOutcome, UploadPath, UploadSource,
};

use super::args::{Cli, Commands};

/// Shared clients for one invocation.
struct App {
    config: Config,
    api: Arc<dyn ChatApi>,
    credentials: Arc<dyn CredentialProvider>,
    notices: Notices,
    notice_rx: UnboundedReceiver<Notice>,
}

impl App {
    fn new(cli: &Cli) -> Result<Self> {
        let mut config = Config::from_env().context("Invalid DOCCHAT_* configuration")?;
        if let Some(url) = &cli.api_url {
            config = config.with_api_url(url).context("Invalid --api-url")?;
        }
        if let Some(url) = &cli.socket_url {
            config = config.with_socket_url(url).context("Invalid --socket-url")?;
        }
        let credentials: Arc<dyn CredentialProvider> = Arc::new(DefaultCredentials::new());
        let api: Arc<dyn ChatApi> = Arc::new(HttpApi::new(config.api_url.clone(), credentials.clone()));
        let (notices, notice_rx) = Notices::channel();
        Ok(Self {
            config,
            api,
            credentials,
            notices,
            notice_rx,
        })
    }

    /// Print notices raised so far.
    fn flush_notices(&mut self) {
        while let Ok(notice) = self.notice_rx.try_recv() {
            print_notice(&notice);
        }
    }
}

fn print_notice(notice: &Notice) {
    eprintln!("[{}] {}", notice.level, notice.text);
}

/// Execute the parsed command.
pub async fn execute(cli: Cli) -> Result<()> {
    let mut ctx = App::new(&cli)?;
    let result = run(&mut ctx, cli.command).await;
    ctx.flush_notices();
    result
}

async fn run(ctx: &mut App, command: Commands) -> Result<()> {
    match command {
        Commands::Sessions => cmd_sessions(ctx).await,
        Commands::Rename { id, title } => {
            let mut store = SessionStore::new(ctx.notices.clone());
            let session = store.rename(ctx.api.as_ref(), &id, &title.join(" ")).await?;
            println!("{}  {}", session.id, session.display_title());
            Ok(())
        }
        Commands::Pin { id } => {
            let mut store = SessionStore::new(ctx.notices.clone());
            let session = store.toggle_pin(ctx.api.as_ref(), &id).await?;
            let state = if session.is_pinned { "pinned" } else { "unpinned" };
            println!("{}  {}", session.id, state);
            Ok(())
        }
        Commands::Delete { id } => {
            let mut store = SessionStore::new(ctx.notices.clone());
            store.delete(ctx.api.as_ref(), &id).await?;
            Ok(())
        }
        Commands::New { document_id } => {
            let mut store = SessionStore::new(ctx.notices.clone());
            let session = store.create(ctx.api.as_ref(), &document_id).await?;
            println!("{}", session.id);
            Ok(())
        }
        Commands::Documents => cmd_documents(ctx).await,
        Commands::DocumentDelete { id } => {
            let mut store = DocumentStore::new(ctx.notices.clone());
            store.delete(ctx.api.as_ref(), &id).await?;
            Ok(())
        }
        Commands::History { session_id } => cmd_history(ctx, &session_id).await,
        Commands::Upload { path, via_channel } => {
            if via_channel {
                cmd_upload_channel(ctx, &path).await
            } else {
                cmd_upload_rest(ctx, &path).await
            }
        }
        Commands::Chat {
            session_id,
            http_stream,
        } => cmd_chat(ctx, &session_id, http_stream).await,
    }
}

async fn cmd_sessions(ctx: &App) -> Result<()> {
    let mut store = SessionStore::new(ctx.notices.clone());
    store.list_all(ctx.api.as_ref()).await?;

    for group in store.grouped(&Local::now()) {
        println!("{}", group.bucket);
        if group.sessions.is_empty() {
            println!("  (none)");
        }
        for session in &group.sessions {
            println!(
                "  {}  {}  ({})",
                session.id,
                session.display_title(),
                session.updated_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
            );
        }
    }
    Ok(())
}

async fn cmd_documents(ctx: &App) -> Result<()> {
    let mut store = DocumentStore::new(ctx.notices.clone());
    store.list_all(ctx.api.as_ref()).await?;

    if store.documents().is_empty() {
        println!("No documents.");
        return Ok(());
    }
    for document in store.documents() {
        println!(
            "{}  {}  {}  {} bytes",
            document.id,
            document.display_name(),
            document.status.as_str(),
            document.size
        );
    }
    Ok(())
}

async fn cmd_history(ctx: &App, session_id: &str) -> Result<()> {
    let mut store = MessageStore::new(ctx.notices.clone());
    store.fetch_history(ctx.api.as_ref(), session_id).await?;

    for message in store.messages() {
        println!("{:>9}  {}", message.role.as_str(), message.content);
    }
    Ok(())
}

/// Read `path` into a fresh file input.
async fn select_file(path: &Path) -> Result<FileInput> {
    let file = SelectedFile::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut input = FileInput::new();
    input.select(file);
    Ok(input)
}

fn report_upload(outcome: UploadOutcome) -> Result<()> {
    match outcome {
        UploadOutcome::SessionReady(session) => {
            println!("Session {} ready for {}", session.id, session.display_title());
            Ok(())
        }
        UploadOutcome::Pending => Ok(()),
        UploadOutcome::Ignored => bail!("Not signed in"),
        UploadOutcome::Rejected(message) | UploadOutcome::Failed(message) => bail!(message),
    }
}

async fn cmd_upload_rest(ctx: &App, path: &Path) -> Result<()> {
    let mut input = select_file(path).await?;
    let mut coordinator = UploadCoordinator::new(ctx.notices.clone());
    let credentials = ctx.credentials.credentials().await;
    let (file, user_id) =
        match coordinator.begin(&mut input, UploadSource::Browse, credentials.as_ref()) {
            Ok(accepted) => accepted,
            Err(outcome) => return report_upload(outcome),
        };

    let mut documents = DocumentStore::new(ctx.notices.clone());
    let mut sessions = SessionStore::new(ctx.notices.clone());
    let outcome = coordinator
        .upload_via_rest(file, user_id, ctx.api.as_ref(), &mut documents, &mut sessions)
        .await;
    report_upload(outcome)
}

/// Open the channel and hand it to a new controller.
fn open_view(ctx: &App) -> (Arc<Channel>, UnboundedReceiver<ChannelEvent>, ChatController) {
    let (channel, events) = Channel::open(ctx.config.channel_config(), ctx.credentials.clone());
    let channel = Arc::new(channel);
    let controller = ChatController::new(
        ctx.api.clone(),
        channel.clone(),
        ctx.credentials.clone(),
        ctx.notices.clone(),
    );
    (channel, events, controller)
}

/// Feed events to the controller until the channel is up.
async fn wait_connected(
    controller: &mut ChatController,
    events: &mut UnboundedReceiver<ChannelEvent>,
    limit: Duration,
) -> Result<()> {
    let deadline = tokio::time::Instant::now() + limit;
    while !controller.connection().connected {
        let event = tokio::time::timeout_at(deadline, events.recv())
            .await
            .map_err(|_| anyhow!("Timed out connecting ({})", controller.debug_info()))?
            .ok_or_else(|| anyhow!("Channel closed ({})", controller.debug_info()))?;
        controller.handle_event(event).await;
    }
    Ok(())
}

async fn cmd_upload_channel(ctx: &mut App, path: &Path) -> Result<()> {
    let mut input = select_file(path).await?;
    let (channel, mut events, mut controller) = open_view(ctx);
    let limit = ctx.config.connect_timeout * ctx.config.reconnect_attempts.max(1);
    wait_connected(&mut controller, &mut events, limit).await?;

    let outcome = controller
        .upload(&mut input, UploadSource::Browse, UploadPath::Channel)
        .await;
    ctx.flush_notices();
    report_upload(outcome)?;

    while controller.uploads().is_uploading() {
        let Some(event) = events.recv().await else {
            bail!("Channel closed ({})", controller.debug_info());
        };
        if let ChannelEvent::Server(ServerEvent::Document(DocumentEvent::DocumentProcessingProgress {
            progress,
            ..
        })) = &event
        {
            eprintln!("Processing... {progress:.0}%");
        }
        controller.handle_event(event).await;
        ctx.flush_notices();
    }

    let result = match controller.session_id() {
        Some(id) => {
            println!("Session {id} ready");
            Ok(())
        }
        None => Err(anyhow!("Upload did not produce a session")),
    };
    channel.close().await;
    result
}

/// Print part of an answer without waiting for the rest.
fn print_piece(piece: &str) {
    print!("{piece}");
    let _ = std::io::stdout().flush();
}

/// Lines of `reader` as a stream, for use in `select!`.
fn input_lines<R: AsyncRead + Unpin>(reader: R) -> LinesStream<BufReader<R>> {
    LinesStream::new(BufReader::new(reader).lines())
}

/// Echo streamed assistant output as it arrives.
fn render(event: &ChannelEvent) {
    let ChannelEvent::Server(ServerEvent::Chat(event)) = event else {
        return;
    };
    match event {
        ChatEvent::AiState { message, .. } if !message.is_empty() => eprintln!("({message})"),
        ChatEvent::StreamChunk { content, .. } => print_piece(content),
        ChatEvent::StreamEnd { .. } => println!(),
        ChatEvent::SystemMessage { message, .. } => println!("[system] {message}"),
        ChatEvent::Error { message, .. } => eprintln!("error: {message}"),
        _ => {}
    }
}

async fn cmd_chat(ctx: &mut App, session_id: &str, http_stream: bool) -> Result<()> {
    let (channel, mut events, mut controller) = open_view(ctx);
    controller.select_session(session_id).await?;
    ctx.flush_notices();
    eprintln!(
        "Chatting in {} (one message per line, Ctrl-D to quit)",
        controller
            .selected_session()
            .map_or(session_id, |s| s.display_title())
    );

    let mut lines = input_lines(tokio::io::stdin());
    loop {
        tokio::select! {
            line = lines.next() => {
                let Some(line) = line else { break };
                let line = line.context("Failed to read stdin")?;
                if http_stream {
                    match controller.stream_message_http(&line, print_piece).await {
                        Ok(()) => println!(),
                        Err(rejected) => eprintln!("Not sent: {rejected}"),
                    }
                } else if let Err(rejection) = controller.send_message(&line).await {
                    eprintln!("Not sent: {rejection} ({})", controller.debug_info());
                }
            }
            event = events.recv() => {
                let Some(event) = event else {
                    bail!("Channel closed ({})", controller.debug_info());
                };
                render(&event);
                controller.handle_event(event).await;
            }
        }
        ctx.flush_notices();
    }

    channel.close().await;
    Ok(())
}
