use anyhow::{Context, Result, bail};
use tracing::info;

use webtrail::{
    buffer::{BrowserBuffer, BufferSource, ConfirmAction},
    cli::{self, Command},
    config,
    credentials::{CredentialStore, FormField, FormFields},
    history,
    host::ConsoleHost,
    logging,
};

fn main() -> Result<()> {
    logging::init_logging();

    let cli_opts = cli::parse();
    let loaded = config::load_config(cli_opts.config_path.as_deref())?;
    let mut cfg = loaded.config;
    if let Some(dir) = cli_opts.data_dir.as_ref() {
        cfg.data_dir = dir.to_string_lossy().to_string();
    }
    info!(
        "webtrail {} data_dir={} config_hash={}",
        env!("CARGO_PKG_VERSION"),
        cfg.data_dir().display(),
        loaded.config_hash
    );

    match cli_opts.command {
        Command::History { limit } => {
            let entries = history::log::read_existing(&cfg.history_log_path())?;
            let limit = limit.unwrap_or(usize::MAX);
            for entry in entries.iter().take(limit) {
                println!("{:>6}  {}  {}", entry.hit, entry.title, entry.url);
            }
        }
        Command::SavePassword {
            url,
            password,
            fields,
        } => {
            let host = url_host(&url)?;
            if password.is_empty() {
                bail!("refusing to save an empty password");
            }
            let form = parse_fields(&fields)?;
            let mut store = CredentialStore::open(&cfg.password_db_path())?;
            store.upsert(&host, &password, &form)?;
            println!("saved password for {host}");
        }
        Command::Autofill { url, after } => {
            let host = url_host(&url)?;
            let store = CredentialStore::open(&cfg.password_db_path())?;
            match store.next_after(&host, after)? {
                Some(record) => println!(
                    "{}  {}  {} fields",
                    record.id,
                    record.host,
                    record.form_fields.0.len()
                ),
                None => println!("no saved password for {host} after id {after}"),
            }
        }
        command => {
            let host = ConsoleHost::new(cli_opts.yes);
            let mut buffer =
                BrowserBuffer::new(cfg, host, BufferSource::Url("about:blank".to_string()));
            run_buffer_command(&mut buffer, command);
        }
    }

    Ok(())
}

fn run_buffer_command(buffer: &mut BrowserBuffer<ConsoleHost>, command: Command) {
    match command {
        Command::Visit { title, url } => buffer.on_title_changed(&title, &url),
        Command::Close { url } => buffer.record_close_page(&url),
        Command::Recover => buffer.recover_prev_close_page(),
        Command::Import { browser } => buffer.request(ConfirmAction::ImportHistory(browser.into())),
        Command::ClearHistory => buffer.request(ConfirmAction::ClearHistory),
        Command::Downloads => buffer.open_downloads_setting(),
        Command::Open { input } => {
            buffer.open_url_or_search(&input);
            println!("{}", buffer.current_url());
        }
        Command::Translate { url } => {
            buffer.on_url_changed(&url);
            buffer.translate_page();
        }
        Command::History { .. } | Command::SavePassword { .. } | Command::Autofill { .. } => {}
    }
}

fn url_host(url: &str) -> Result<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .with_context(|| format!("no host in {url}"))
}

fn parse_fields(raw: &[String]) -> Result<FormFields> {
    let mut fields = Vec::with_capacity(raw.len());
    for item in raw {
        let Some((name, selector)) = item.split_once('=') else {
            bail!("form field {item:?} is not name=selector");
        };
        let kind = if name.to_ascii_lowercase().contains("pass") {
            "password"
        } else {
            "text"
        };
        fields.push(FormField {
            name: name.to_string(),
            kind: kind.to_string(),
            selector: selector.to_string(),
        });
    }
    Ok(FormFields(fields))
}
