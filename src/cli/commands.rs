use std::fmt::Write as _;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use time::{Date, OffsetDateTime};
use unicode_segmentation::UnicodeSegmentation;

use crate::app::{Board, Command, CommandOutcome, NoticeLevel};
use crate::board::{Card, CardColor, CardId, CardStore};
use crate::calendar::{date_key, parse_date_key, YearMonth};
use crate::config::AppConfig;
use crate::remote::{RemoteWorker, TableStoreClient};
use crate::sanitize::ImageUploads;
use crate::search::{SearchHit, SearchScope};
use crate::storage::StorageHandle;
use crate::view::HeadlessViewport;

const LIST_WIDTH: usize = 72;

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// Day in YYYY-MM-DD form
    #[arg(value_parser = parse_date_arg)]
    pub date: Date,
    /// Card text. If omitted, reads from stdin.
    #[arg()]
    pub text: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Only this month (YYYY-MM)
    #[arg(long, value_parser = parse_month_arg)]
    pub month: Option<YearMonth>,
    /// Only this day (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date_arg, conflicts_with = "month")]
    pub day: Option<Date>,
    /// Print full card text instead of one truncated line
    #[arg(long)]
    pub full: bool,
}

#[derive(Args, Debug, Clone)]
pub struct IdArgs {
    /// Card identifier
    pub id: CardId,
}

#[derive(Args, Debug, Clone)]
pub struct ColorArgs {
    /// Card identifier
    pub id: CardId,
    /// default, yellow, green or pink. Cycles to the next color if omitted.
    #[arg(value_parser = parse_color_arg)]
    pub color: Option<CardColor>,
}

#[derive(Args, Debug, Clone)]
pub struct MoveArgs {
    /// Cards to move, in order
    #[arg(required = true)]
    pub ids: Vec<CardId>,
    /// Destination day (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date_arg)]
    pub to: Date,
    /// Insert position in the destination day (appends if omitted)
    #[arg(long)]
    pub index: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct PasteArgs {
    /// Day in YYYY-MM-DD form
    #[arg(value_parser = parse_date_arg)]
    pub date: Date,
}

#[derive(Args, Debug, Clone)]
pub struct ImageArgs {
    /// Card identifier
    pub id: CardId,
    /// Image file to embed
    pub path: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Text to look for (case-insensitive)
    #[arg(required = true)]
    pub query: Vec<String>,
    /// Search every stored card instead of the configured default scope
    #[arg(long)]
    pub all: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Target directory (defaults to the configured export directory)
    #[arg(long)]
    pub dir: Option<PathBuf>,
}

pub fn add(board: &mut Board, args: AddArgs) -> Result<()> {
    let text = if args.text.is_empty() {
        read_stdin()?.unwrap_or_default()
    } else {
        args.text.join(" ")
    };
    let text = text.trim();
    if text.is_empty() {
        bail!("card text cannot be empty");
    }
    match board.apply(Command::Add {
        date: args.date,
        text: text.to_string(),
    }) {
        CommandOutcome::Created(ids) => {
            for id in ids {
                println!("Created card #{id} on {}", date_key(args.date));
            }
            Ok(())
        }
        outcome => outcome_error(outcome),
    }
}

pub fn list(board: &Board, args: ListArgs) -> Result<()> {
    let filter = match (args.day, args.month) {
        (Some(day), _) => ListFilter::Day(day),
        (None, Some(month)) => ListFilter::Month(month),
        (None, None) => ListFilter::All,
    };
    let width = if args.full { None } else { Some(LIST_WIDTH) };
    print!("{}", format_listing(board.store(), filter, width));
    Ok(())
}

pub fn toggle_done(board: &mut Board, args: IdArgs) -> Result<()> {
    match board.apply(Command::ToggleDone(args.id)) {
        CommandOutcome::Done(done) => {
            let state = if done { "done" } else { "open" };
            println!("Card #{} is {state}", args.id);
            Ok(())
        }
        outcome => outcome_error(outcome).with_context(|| format!("card #{}", args.id)),
    }
}

pub fn color(board: &mut Board, args: ColorArgs) -> Result<()> {
    let command = match args.color {
        Some(color) => Command::SetColor { id: args.id, color },
        None => Command::CycleColor(args.id),
    };
    match board.apply(command) {
        CommandOutcome::Colored(color) => {
            println!("Card #{} is now {color}", args.id);
            Ok(())
        }
        outcome => outcome_error(outcome).with_context(|| format!("card #{}", args.id)),
    }
}

pub fn move_cards(board: &mut Board, args: MoveArgs) -> Result<()> {
    match board.apply(Command::Move {
        ids: args.ids,
        date: args.to,
        index: args.index,
    }) {
        CommandOutcome::Moved(outcome) => {
            let ids: Vec<String> = outcome.moved.iter().map(|id| format!("#{id}")).collect();
            println!("Moved {} to {}", ids.join(", "), date_key(outcome.destination));
            Ok(())
        }
        outcome => outcome_error(outcome),
    }
}

pub fn delete(board: &mut Board, args: IdArgs) -> Result<()> {
    match board.apply(Command::Delete(args.id)) {
        CommandOutcome::Deleted => {
            println!("Deleted card #{}", args.id);
            Ok(())
        }
        outcome => outcome_error(outcome).with_context(|| format!("card #{}", args.id)),
    }
}

pub fn paste(board: &mut Board, args: PasteArgs) -> Result<()> {
    let Some(raw) = read_stdin()? else {
        bail!("paste reads clipboard text from stdin");
    };
    match board.apply(Command::Paste {
        date: args.date,
        raw,
    }) {
        CommandOutcome::Created(ids) => {
            println!("Pasted {} card(s) into {}", ids.len(), date_key(args.date));
            Ok(())
        }
        outcome => outcome_error(outcome),
    }
}

pub fn image(board: &mut Board, config: &AppConfig, args: ImageArgs) -> Result<()> {
    let uploads = ImageUploads::spawn(config.sanitize.max_image_bytes)?;
    board.attach_uploads(uploads);
    if !board.upload_image(args.id, args.path.clone()) {
        bail!("no card #{} to attach {} to", args.id, args.path.display());
    }
    let applied = board.wait_upload();
    print_notices(board);
    if !applied {
        bail!("image was not attached to card #{}", args.id);
    }
    println!("Attached {} to card #{}", args.path.display(), args.id);
    Ok(())
}

pub fn search(board: &mut Board, config: &AppConfig, args: SearchArgs) -> Result<()> {
    let query = args.query.join(" ");
    if query.trim().is_empty() {
        bail!("search query cannot be empty");
    }
    let scope = if args.all {
        SearchScope::Global
    } else {
        config.search.default_scope
    };
    let mut viewport = HeadlessViewport::new(800.0, 120.0);
    let hit = board.search(&query, scope, &mut viewport, OffsetDateTime::now_utc());
    match hit {
        Some(hit) => print!("{}", format_hit(board.store(), &hit)),
        None => print_notices(board),
    }
    Ok(())
}

pub fn export(board: &mut Board, storage: &StorageHandle, args: ExportArgs) -> Result<()> {
    let dir = args.dir.unwrap_or_else(|| storage.export_dir().to_path_buf());
    let path = board.export(&dir)?;
    println!("Exported {}", path.display());
    Ok(())
}

pub fn publish(board: &mut Board, config: &AppConfig) -> Result<()> {
    attach_remote(board, config)?;
    if !board.publish_remote(OffsetDateTime::now_utc()) {
        print_notices(board);
        bail!("snapshot was not published");
    }
    finish_remote(board)
}

pub fn pull(board: &mut Board, config: &AppConfig) -> Result<()> {
    attach_remote(board, config)?;
    if !board.fetch_remote() {
        print_notices(board);
        bail!("remote snapshot was not requested");
    }
    finish_remote(board)
}

fn attach_remote(board: &mut Board, config: &AppConfig) -> Result<()> {
    let client = TableStoreClient::from_config(&config.remote).context("configuring remote")?;
    board.attach_remote(RemoteWorker::spawn(Box::new(client))?);
    Ok(())
}

fn finish_remote(board: &mut Board) -> Result<()> {
    let result = board.wait_remote();
    print_notices(board);
    match result {
        Some(Ok(())) => Ok(()),
        Some(Err(err)) => Err(err).context("remote request failed"),
        None => bail!("remote worker stopped before answering"),
    }
}

fn print_notices(board: &mut Board) {
    for notice in board.notices_mut().drain() {
        match notice.level {
            NoticeLevel::Info => println!("{}", notice.message),
            NoticeLevel::Error => eprintln!("error: {}", notice.message),
        }
    }
}

fn outcome_error(outcome: CommandOutcome) -> Result<()> {
    match outcome {
        CommandOutcome::Rejected(err) => Err(err).context("card content rejected"),
        CommandOutcome::Ignored => bail!("no matching card"),
        other => bail!("unexpected outcome {other:?}"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListFilter {
    All,
    Month(YearMonth),
    Day(Date),
}

impl ListFilter {
    fn matches(self, date: Date) -> bool {
        match self {
            ListFilter::All => true,
            ListFilter::Month(month) => month.contains(date),
            ListFilter::Day(day) => day == date,
        }
    }
}

fn format_listing(store: &CardStore, filter: ListFilter, width: Option<usize>) -> String {
    let mut out = String::new();
    for (date, cards) in store.iter().filter(|(date, _)| filter.matches(*date)) {
        let _ = writeln!(&mut out, "{}  {}", date_key(date), date.weekday());
        for card in cards {
            let _ = writeln!(&mut out, "  {}", format_card(card, width));
        }
    }
    if out.is_empty() {
        out.push_str("No cards.\n");
    }
    out
}

fn format_card(card: &Card, width: Option<usize>) -> String {
    let mark = if card.done { "[x]" } else { "[ ]" };
    let mut line = format!("#{:<4} {mark}", card.id);
    if card.color != CardColor::Default {
        let _ = write!(&mut line, " ({})", card.color);
    }
    let text = match width {
        Some(width) => truncate(&card.text().replace('\n', " / "), width),
        None => card.text().to_string(),
    };
    let _ = write!(&mut line, " {text}");
    if !card.content.images.is_empty() {
        let _ = write!(&mut line, "  [{} image(s)]", card.content.images.len());
    }
    line
}

fn truncate(text: &str, width: usize) -> String {
    let graphemes: Vec<&str> = text.graphemes(true).collect();
    if graphemes.len() <= width {
        return text.to_string();
    }
    let mut out: String = graphemes[..width.saturating_sub(1)].concat();
    out.push('…');
    out
}

fn format_hit(store: &CardStore, hit: &SearchHit) -> String {
    let Some((_, card)) = store.find(hit.id) else {
        return format!("{}  #{}\n", date_key(hit.date), hit.id);
    };
    let text = card.text();
    let mut marked = String::new();
    let mut cursor = 0;
    for span in &hit.spans {
        let (Some(before), Some(matched)) = (text.get(cursor..span.start), text.get(span.clone()))
        else {
            continue;
        };
        marked.push_str(before);
        let _ = write!(&mut marked, "[{matched}]");
        cursor = span.end;
    }
    marked.push_str(text.get(cursor..).unwrap_or_default());
    format!("{}  #{}  {}\n", date_key(hit.date), hit.id, marked)
}

fn parse_date_arg(raw: &str) -> Result<Date, String> {
    parse_date_key(raw).ok_or_else(|| format!("expected YYYY-MM-DD, got '{raw}'"))
}

fn parse_month_arg(raw: &str) -> Result<YearMonth, String> {
    YearMonth::parse(raw).ok_or_else(|| format!("expected YYYY-MM, got '{raw}'"))
}

fn parse_color_arg(raw: &str) -> Result<CardColor, String> {
    raw.trim()
        .to_ascii_lowercase()
        .parse()
        .map_err(|_| format!("unknown color '{raw}'"))
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(Some(buf))
}
