/// Terminal dashboard for lntop
///
/// Renders the model store with crossterm: node header, balance summary,
/// channel table, recent events and a footer with hub status. Sections are
/// redrawn incrementally; only lines whose text changed are printed.
///
/// Keys: [Q/ESC/Ctrl+C] quit, [R] redraw, [S] cycle sort, [C] clear events
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{self, Event as TermEvent, KeyCode, KeyEvent, KeyModifiers},
    execute,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
    terminal::{
        self, Clear, ClearType, DisableLineWrap, EnableLineWrap, EnterAlternateScreen,
        LeaveAlternateScreen, SetTitle,
    },
    QueueableCommand,
};
use chrono::Local;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{self, stdout, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};
use unicode_width::UnicodeWidthChar;

use crate::config::ViewsConfig;
use crate::events::{Event, EventKind, Topic};
use crate::hub::{Hub, SubscriptionState};
use crate::logger::{LogTag, Logger};
use crate::shutdown::Shutdown;
use crate::store::{Applied, Channel, ModelStore, Snapshot};

const MIN_TERMINAL_WIDTH: u16 = 80;
const MIN_TERMINAL_HEIGHT: u16 = 20;
const INPUT_POLL_MS: u64 = 50;
const GAUGE_WIDTH: usize = 12;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum DashboardPhase {
    Running,
    ShuttingDown,
}

/// A single renderable line with style
#[derive(Debug, Clone)]
struct RenderLine {
    text: String,
    color: Color,
    bold: bool,
    is_wrapped: bool,     // line carries vertical borders at both ends
    is_border_only: bool, // top/bottom/separator line
}

impl RenderLine {
    fn border(text: String) -> Self {
        Self {
            text,
            color: BORDER_COLOR,
            bold: false,
            is_wrapped: false,
            is_border_only: true,
        }
    }

    fn content(text: String, color: Color, bold: bool) -> Self {
        Self {
            text,
            color,
            bold,
            is_wrapped: true,
            is_border_only: false,
        }
    }
}

const BORDER_COLOR: Color = Color::Grey;

/// Unicode box-drawing characters for panel borders
struct BorderChars {
    top_left: char,
    top_right: char,
    bottom_left: char,
    bottom_right: char,
    horizontal: char,
    vertical: char,
    left_tee: char,
    right_tee: char,
}

impl BorderChars {
    /// Spaces between content and vertical borders
    const INSET: usize = 1;

    const ROUNDED: BorderChars = BorderChars {
        top_left: '╭',
        top_right: '╮',
        bottom_left: '╰',
        bottom_right: '╯',
        horizontal: '─',
        vertical: '│',
        left_tee: '├',
        right_tee: '┤',
    };

    fn line(&self, left: char, right: char, width: u16) -> String {
        if width < 2 {
            return String::new();
        }
        format!(
            "{}{}{}",
            left,
            self.horizontal.to_string().repeat((width as usize) - 2),
            right
        )
    }

    /// Top border with a title embedded after the corner
    fn titled_top(&self, title: &str, width: u16) -> String {
        let plain = self.line(self.top_left, self.top_right, width);
        if title.is_empty() || (width as usize) < title.chars().count() + 6 {
            return plain;
        }
        let mut out = String::new();
        out.push(self.top_left);
        out.push(self.horizontal);
        out.push(' ');
        out.push_str(title);
        out.push(' ');
        let used = 4 + title.chars().count();
        out.push_str(
            &self
                .horizontal
                .to_string()
                .repeat((width as usize).saturating_sub(used + 1)),
        );
        out.push(self.top_right);
        out
    }

    fn bottom_border(&self, width: u16) -> String {
        self.line(self.bottom_left, self.bottom_right, width)
    }

    fn separator(&self, width: u16) -> String {
        self.line(self.left_tee, self.right_tee, width)
    }

    /// Wrap text content with vertical borders and a small inset
    fn wrap_content(&self, content: &str, width: u16) -> String {
        if width < 2 {
            return String::new();
        }
        let inner = (width as usize) - 2;
        let inset = Self::INSET.min(inner / 2);
        let avail = inner.saturating_sub(inset * 2);
        let padded = pad_truncate(content, avail);
        format!(
            "{}{}{}{}{}",
            self.vertical,
            " ".repeat(inset),
            padded,
            " ".repeat(inset),
            self.vertical
        )
    }
}

// =============================================================================
// EVENT FEED
// =============================================================================

#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub time: String,
    pub topic: Topic,
    pub text: String,
    pub health: bool,
    pub applied: Applied,
}

/// Ring buffer of recently applied events, shared between the consumer task
/// and the dashboard.
pub struct EventFeed {
    entries: Mutex<VecDeque<FeedEntry>>,
    capacity: usize,
}

impl EventFeed {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
            capacity: capacity.max(1),
        })
    }

    pub fn push(&self, event: &Event, applied: Applied) {
        let entry = FeedEntry {
            time: Local::now().format("%H:%M:%S").to_string(),
            topic: event.topic,
            text: event.summary(),
            health: event.kind.is_health_signal(),
            applied,
        };
        let mut entries = self.entries.lock();
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Newest first
    pub fn recent(&self) -> Vec<FeedEntry> {
        self.entries.lock().iter().rev().cloned().collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// CHANNEL SORTING
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    LocalBalance,
    Capacity,
    Updates,
    ChannelPoint,
}

impl SortColumn {
    fn next(self) -> Self {
        match self {
            SortColumn::LocalBalance => SortColumn::Capacity,
            SortColumn::Capacity => SortColumn::Updates,
            SortColumn::Updates => SortColumn::ChannelPoint,
            SortColumn::ChannelPoint => SortColumn::LocalBalance,
        }
    }

    fn label(self) -> &'static str {
        match self {
            SortColumn::LocalBalance => "local",
            SortColumn::Capacity => "capacity",
            SortColumn::Updates => "updates",
            SortColumn::ChannelPoint => "channel",
        }
    }
}

fn sorted_channels(snapshot: &Snapshot, column: SortColumn) -> Vec<&Channel> {
    let mut channels: Vec<&Channel> = snapshot.channels.values().collect();
    match column {
        SortColumn::LocalBalance => channels.sort_by(|a, b| b.local_balance.cmp(&a.local_balance)),
        SortColumn::Capacity => channels.sort_by(|a, b| b.capacity.cmp(&a.capacity)),
        SortColumn::Updates => channels.sort_by(|a, b| b.update_counter.cmp(&a.update_counter)),
        SortColumn::ChannelPoint => {}
    }
    channels
}

// =============================================================================
// DASHBOARD
// =============================================================================

pub struct Dashboard {
    store: Arc<ModelStore>,
    hub: Arc<Hub>,
    feed: Arc<EventFeed>,
    views: ViewsConfig,
    logger: Logger,
    terminal_size: (u16, u16),
    prev_header: Vec<String>,
    prev_summary: Vec<String>,
    prev_channels: Vec<String>,
    prev_events: Vec<String>,
    prev_footer: Vec<String>,
    force_redraw: bool,
    last_snapshot: Option<Arc<Snapshot>>,
    phase: DashboardPhase,
    sort: SortColumn,
    spinner_idx: usize,
}

impl Dashboard {
    pub fn new(
        store: Arc<ModelStore>,
        hub: Arc<Hub>,
        feed: Arc<EventFeed>,
        views: ViewsConfig,
        logger: Logger,
    ) -> Self {
        let (width, height) = terminal::size().unwrap_or((120, 40));
        Self {
            store,
            hub,
            feed,
            views,
            logger,
            terminal_size: (width, height),
            prev_header: Vec::new(),
            prev_summary: Vec::new(),
            prev_channels: Vec::new(),
            prev_events: Vec::new(),
            prev_footer: Vec::new(),
            force_redraw: true,
            last_snapshot: None,
            phase: DashboardPhase::Running,
            sort: SortColumn::LocalBalance,
            spinner_idx: 0,
        }
    }

    /// Switch the terminal to the alternate screen in raw mode.
    pub fn initialize(&mut self) -> io::Result<()> {
        let (width, height) = terminal::size()?;
        if width < MIN_TERMINAL_WIDTH || height < MIN_TERMINAL_HEIGHT {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "terminal too small: need {}x{}, have {}x{}",
                    MIN_TERMINAL_WIDTH, MIN_TERMINAL_HEIGHT, width, height
                ),
            ));
        }
        self.terminal_size = (width, height);

        execute!(
            stdout(),
            EnterAlternateScreen,
            DisableLineWrap,
            Hide,
            Clear(ClearType::Purge),
            Clear(ClearType::All),
            SetTitle("lntop")
        )?;
        terminal::enable_raw_mode()?;
        self.logger.debug(
            LogTag::Dashboard,
            &format!("Dashboard initialized at {}x{}", width, height),
        );
        Ok(())
    }

    /// Draw until the user quits or `shutdown` fires. A quit key triggers
    /// `shutdown` itself.
    pub async fn run(&mut self, shutdown: Shutdown) -> io::Result<()> {
        let refresh = Duration::from_millis(self.views.refresh_ms);
        let mut last_draw = Instant::now();

        loop {
            if shutdown.is_triggered() {
                self.phase = DashboardPhase::ShuttingDown;
                self.draw()?;
                break;
            }

            if event::poll(Duration::from_millis(INPUT_POLL_MS))? {
                if let TermEvent::Key(key_event) = event::read()? {
                    if self.handle_input(key_event) {
                        self.logger.info(LogTag::Dashboard, "Quit requested");
                        shutdown.trigger();
                        continue;
                    }
                }
            }

            let snapshot = self.store.current();
            let changed = self
                .last_snapshot
                .as_ref()
                .map_or(true, |last| !Arc::ptr_eq(last, &snapshot));

            if self.force_redraw || changed || last_draw.elapsed() >= refresh {
                self.force_redraw = false;
                self.last_snapshot = Some(snapshot);
                self.draw()?;
                last_draw = Instant::now();
            }

            tokio::select! {
                _ = shutdown.wait() => {}
                _ = tokio::time::sleep(Duration::from_millis(INPUT_POLL_MS)) => {}
            }
        }

        Ok(())
    }

    /// Returns true when the user asked to quit.
    fn handle_input(&mut self, key_event: KeyEvent) -> bool {
        match key_event.code {
            KeyCode::Char('c') if key_event.modifiers.contains(KeyModifiers::CONTROL) => true,
            KeyCode::Char('q') | KeyCode::Esc => true,
            KeyCode::Char('r') => {
                self.invalidate();
                false
            }
            KeyCode::Char('s') => {
                self.sort = self.sort.next();
                self.force_redraw = true;
                false
            }
            KeyCode::Char('c') => {
                self.feed.clear();
                self.force_redraw = true;
                false
            }
            _ => false,
        }
    }

    fn invalidate(&mut self) {
        self.prev_header.clear();
        self.prev_summary.clear();
        self.prev_channels.clear();
        self.prev_events.clear();
        self.prev_footer.clear();
        self.force_redraw = true;
    }

    fn draw(&mut self) -> io::Result<()> {
        let mut stdout = stdout();

        let (width, height) = terminal::size().unwrap_or(self.terminal_size);
        if (width, height) != self.terminal_size {
            self.terminal_size = (width, height);
            self.invalidate();
            stdout.queue(MoveTo(0, 0))?;
            stdout.queue(Clear(ClearType::All))?;
        }

        let snapshot = self.store.current();

        let header_height = 4u16;
        let summary_height = 7u16;
        let footer_height = 3u16;
        let events_height = (self.views.recent_events as u16).saturating_add(2);
        let body = height.saturating_sub(header_height + summary_height + footer_height);
        let events_height = events_height.min(body / 2);
        let channels_height = body.saturating_sub(events_height);

        let mut row = 0u16;

        let header = self.build_header_lines(&snapshot, width);
        draw_section(&mut stdout, row, width, &header, &mut self.prev_header)?;
        row += header_height;

        let summary = build_summary_lines(&snapshot, width);
        draw_section(&mut stdout, row, width, &summary, &mut self.prev_summary)?;
        row += summary_height;

        let channels = build_channel_lines(&snapshot, self.sort, width, channels_height);
        draw_section(&mut stdout, row, width, &channels, &mut self.prev_channels)?;
        row += channels_height;

        let events = build_event_lines(&self.feed.recent(), width, events_height);
        draw_section(&mut stdout, row, width, &events, &mut self.prev_events)?;

        let footer = self.build_footer_lines(width);
        draw_section(
            &mut stdout,
            height.saturating_sub(footer_height),
            width,
            &footer,
            &mut self.prev_footer,
        )?;

        self.spinner_idx = (self.spinner_idx + 1) % 4;
        stdout.flush()
    }

    fn spinner(&self) -> char {
        match self.spinner_idx {
            0 => '-',
            1 => '\\',
            2 => '|',
            _ => '/',
        }
    }

    fn phase_label(&self) -> &'static str {
        match self.phase {
            DashboardPhase::Running => "Running",
            DashboardPhase::ShuttingDown => "Shutting down",
        }
    }

    fn build_header_lines(&self, snapshot: &Snapshot, width: u16) -> Vec<RenderLine> {
        let border = &BorderChars::ROUNDED;
        let node = &snapshot.node;
        let alias = if node.alias.is_empty() { "unknown" } else { node.alias.as_str() };

        let title = format!(
            "lntop  {}  {}  [{} {}]",
            alias,
            node.pubkey,
            self.phase_label(),
            self.spinner()
        );
        let sync = if node.synced_to_chain { "synced" } else { "NOT SYNCED" };
        let status = format!(
            "block {}  {}  lnd {}  {}",
            node.block_height,
            sync,
            node.version,
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );

        vec![
            RenderLine::border(border.line(border.top_left, border.top_right, width)),
            RenderLine::content(border.wrap_content(&title, width), Color::White, true),
            RenderLine::content(
                border.wrap_content(&status, width),
                if node.synced_to_chain { Color::White } else { Color::Yellow },
                false,
            ),
            RenderLine::border(border.bottom_border(width)),
        ]
    }

    fn build_footer_lines(&self, width: u16) -> Vec<RenderLine> {
        let border = &BorderChars::ROUNDED;
        let metrics = self.hub.metrics();

        let mut topics = Vec::new();
        for sub in self.hub.subscriptions() {
            let mark = match sub.state {
                SubscriptionState::Streaming => "ok".to_string(),
                SubscriptionState::Failed => "DOWN".to_string(),
                other => format!("{}({})", other.as_str(), sub.retry_count),
            };
            topics.push(format!("{}:{}", sub.topic, mark));
        }
        let any_failed = self
            .hub
            .subscriptions()
            .iter()
            .any(|s| s.state == SubscriptionState::Failed);

        let controls = if self.phase == DashboardPhase::ShuttingDown {
            "Stopping subscriptions...".to_string()
        } else {
            format!(
                "[Q/ESC] Quit | [R] Redraw | [S] Sort ({}) | [C] Clear events | events {} | dropped {} | reconnects {}",
                self.sort.label(),
                metrics.events_published,
                metrics.events_discarded,
                metrics.reconnects
            )
        };

        vec![
            RenderLine::border(border.line(border.top_left, border.top_right, width)),
            RenderLine::content(
                border.wrap_content(&format!("{}  {}", controls, topics.join(" ")), width),
                if any_failed { Color::Yellow } else { Color::White },
                false,
            ),
            RenderLine::border(border.bottom_border(width)),
        ]
    }

    /// Restore the terminal.
    pub fn shutdown(&self) -> io::Result<()> {
        execute!(stdout(), Show, EnableLineWrap, LeaveAlternateScreen)?;
        terminal::disable_raw_mode()?;
        self.logger.debug(LogTag::Dashboard, "Terminal restored");
        Ok(())
    }
}

fn build_summary_lines(snapshot: &Snapshot, width: u16) -> Vec<RenderLine> {
    let border = &BorderChars::ROUNDED;
    let totals = &snapshot.totals;
    let activity = &snapshot.activity;

    let balances = format!(
        "capacity {}  local {}  remote {}  {}",
        format_sat(totals.capacity),
        format_sat(totals.local_balance),
        format_sat(totals.remote_balance),
        gauge(totals.local_balance, totals.capacity, GAUGE_WIDTH * 2)
    );
    let channels = format!(
        "channels {}  active {}  inactive {}  balance {}  pending open {}",
        snapshot.channels.len(),
        totals.active,
        totals.inactive,
        format_sat(snapshot.balance.balance),
        format_sat(snapshot.balance.pending_open_balance)
    );
    let traffic = format!(
        "sent {}  received {}  unsettled {}  pending htlcs {}  commit fees {}",
        format_sat(totals.total_sent),
        format_sat(totals.total_received),
        format_sat(totals.unsettled_balance),
        totals.pending_htlcs,
        format_sat(totals.commit_fees)
    );
    let activity_line = format!(
        "htlcs settled {}  invoices settled {}  transactions {}  last tx block {}",
        activity.htlcs_settled,
        activity.invoices_settled,
        activity.transactions_seen,
        activity.last_block_height
    );
    let (degraded, degraded_color) = if snapshot.degraded_topics.is_empty() {
        ("all subscriptions healthy".to_string(), Color::Green)
    } else {
        (
            format!(
                "degraded: {}",
                snapshot
                    .degraded_topics
                    .iter()
                    .map(Topic::code)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Color::Red,
        )
    };

    vec![
        RenderLine::border(border.titled_top("Summary", width)),
        RenderLine::content(border.wrap_content(&balances, width), Color::Cyan, true),
        RenderLine::content(border.wrap_content(&channels, width), Color::White, false),
        RenderLine::content(border.wrap_content(&traffic, width), Color::White, false),
        RenderLine::content(border.wrap_content(&activity_line, width), Color::White, false),
        RenderLine::content(border.wrap_content(&degraded, width), degraded_color, false),
        RenderLine::border(border.bottom_border(width)),
    ]
}

/// Channel table layout: header, width, right-aligned
const COLUMNS: [(&str, usize, bool); 14] = [
    ("STATUS", 8, false),
    ("GAUGE", GAUGE_WIDTH + 7, false),
    ("LOCAL", 13, true),
    ("CAPACITY", 13, true),
    ("SENT", 11, true),
    ("RECEIVED", 11, true),
    ("HTLC", 4, true),
    ("UNSETTLED", 10, true),
    ("CFEE", 8, true),
    ("CSV", 5, true),
    ("UPDATES", 8, true),
    ("PRIV", 4, false),
    ("PEER", 20, false),
    ("ID", 0, false),
];

fn format_columns(cells: &[String]) -> String {
    let mut out = String::new();
    for (i, (cell, (_, width, right))) in cells.iter().zip(COLUMNS.iter()).enumerate() {
        if i > 0 {
            out.push(' ');
        }
        if *right {
            out.push_str(&format!("{:>width$}", cell, width = *width));
        } else {
            out.push_str(&format!("{:<width$}", cell, width = *width));
        }
    }
    out
}

fn channel_row(channel: &Channel) -> String {
    format_columns(&[
        if channel.active { "active" } else { "inactive" }.to_string(),
        gauge(channel.local_balance, channel.capacity, GAUGE_WIDTH),
        format_sat(channel.local_balance),
        format_sat(channel.capacity),
        format_sat(channel.total_sent),
        format_sat(channel.total_received),
        channel.pending_htlcs.to_string(),
        format_sat(channel.unsettled_balance),
        format_sat(channel.commit_fee),
        channel.csv_delay.to_string(),
        channel.update_counter.to_string(),
        if channel.private { "yes" } else { "" }.to_string(),
        truncate_middle(&channel.remote_party, 20),
        channel.short_channel_id.to_string(),
    ])
}

fn build_channel_lines(
    snapshot: &Snapshot,
    sort: SortColumn,
    width: u16,
    height: u16,
) -> Vec<RenderLine> {
    let mut v = Vec::new();
    if height < 4 {
        return v;
    }
    let border = &BorderChars::ROUNDED;

    v.push(RenderLine::border(border.titled_top(
        &format!("Channels ({}, sorted by {})", snapshot.channels.len(), sort.label()),
        width,
    )));
    let headers: Vec<String> = COLUMNS.iter().map(|(name, _, _)| name.to_string()).collect();
    let columns = format_columns(&headers);
    v.push(RenderLine::content(border.wrap_content(&columns, width), Color::White, true));
    v.push(RenderLine::border(border.separator(width)));

    let rows = (height as usize).saturating_sub(4);
    let channels = sorted_channels(snapshot, sort);
    for channel in channels.iter().take(rows) {
        let color = if channel.active { Color::Green } else { Color::DarkGrey };
        v.push(RenderLine::content(
            border.wrap_content(&channel_row(channel), width),
            color,
            false,
        ));
    }
    if channels.is_empty() && rows > 0 {
        v.push(RenderLine::content(
            border.wrap_content("no open channels", width),
            Color::DarkGrey,
            false,
        ));
    }
    while v.len() < (height as usize) - 1 {
        v.push(RenderLine::content(border.wrap_content("", width), Color::White, false));
    }
    v.push(RenderLine::border(border.bottom_border(width)));
    v
}

fn build_event_lines(entries: &[FeedEntry], width: u16, height: u16) -> Vec<RenderLine> {
    let mut v = Vec::new();
    if height < 3 {
        return v;
    }
    let border = &BorderChars::ROUNDED;
    v.push(RenderLine::border(border.titled_top("Recent events", width)));

    let rows = (height as usize) - 2;
    for entry in entries.iter().take(rows) {
        let color = if entry.health {
            if entry.text.contains("StreamDegraded") {
                Color::Red
            } else {
                Color::Green
            }
        } else if entry.applied == Applied::Updated {
            Color::Cyan
        } else {
            Color::DarkGrey
        };
        let line = format!("{} {}", entry.time, entry.text);
        v.push(RenderLine::content(border.wrap_content(&line, width), color, false));
    }
    while v.len() < rows + 1 {
        v.push(RenderLine::content(border.wrap_content("", width), Color::White, false));
    }
    v.push(RenderLine::border(border.bottom_border(width)));
    v
}

/// Draw only the lines that changed.
fn draw_section(
    stdout: &mut io::Stdout,
    start_row: u16,
    width: u16,
    lines: &[RenderLine],
    prev_cache: &mut Vec<String>,
) -> io::Result<()> {
    for (i, rl) in lines.iter().enumerate() {
        let row = start_row.saturating_add(i as u16);
        let new_text = pad_truncate(&rl.text, width as usize);
        if prev_cache.get(i).map(String::as_str) == Some(new_text.as_str()) {
            continue;
        }

        stdout.queue(MoveTo(0, row))?;
        stdout.queue(Clear(ClearType::CurrentLine))?;
        stdout.queue(SetAttribute(Attribute::Reset))?;
        stdout.queue(ResetColor)?;

        let chars: Vec<char> = new_text.chars().collect();
        if rl.is_wrapped && !rl.is_border_only && chars.len() >= 2 {
            let middle: String = chars[1..chars.len() - 1].iter().collect();
            stdout.queue(SetForegroundColor(BORDER_COLOR))?;
            stdout.queue(Print(chars[0]))?;
            stdout.queue(SetForegroundColor(rl.color))?;
            if rl.bold {
                stdout.queue(SetAttribute(Attribute::Bold))?;
            }
            stdout.queue(Print(middle))?;
            stdout.queue(SetAttribute(Attribute::Reset))?;
            stdout.queue(SetForegroundColor(BORDER_COLOR))?;
            stdout.queue(Print(chars[chars.len() - 1]))?;
        } else {
            stdout.queue(SetForegroundColor(rl.color))?;
            if rl.bold {
                stdout.queue(SetAttribute(Attribute::Bold))?;
            }
            stdout.queue(Print(&new_text))?;
        }
        stdout.queue(SetAttribute(Attribute::Reset))?;
        stdout.queue(ResetColor)?;

        if prev_cache.len() <= i {
            prev_cache.resize(i + 1, String::new());
        }
        prev_cache[i] = new_text;
    }
    prev_cache.truncate(lines.len());
    Ok(())
}

/// Pad or truncate to an exact display width (Unicode-aware).
fn pad_truncate(text: &str, target: usize) -> String {
    let mut out = String::with_capacity(target);
    let mut curw = 0usize;
    for ch in text.chars() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if curw + w > target {
            break;
        }
        out.push(ch);
        curw += w;
    }
    if curw < target {
        out.push_str(&" ".repeat(target - curw));
    }
    out
}

fn truncate_middle(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max || max < 3 {
        return text.chars().take(max).collect();
    }
    let keep = max - 1;
    let head: String = text.chars().take(keep - keep / 2).collect();
    let tail: String = text.chars().skip(count - keep / 2).collect();
    format!("{}…{}", head, tail)
}

/// Satoshi amount with thousands separators
fn format_sat(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if amount < 0 {
        format!("-{}", out)
    } else {
        out
    }
}

/// `[||||      ] 40%` style balance gauge
fn gauge(local: i64, capacity: i64, width: usize) -> String {
    let ratio = if capacity > 0 {
        (local.max(0) as f64 / capacity as f64).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = (ratio * width as f64).round() as usize;
    format!(
        "[{}{}] {:>3}%",
        "|".repeat(filled),
        " ".repeat(width - filled),
        (ratio * 100.0).round() as u32
    )
}

/// Initialize, run and always restore the terminal.
pub async fn run_dashboard(
    store: Arc<ModelStore>,
    hub: Arc<Hub>,
    feed: Arc<EventFeed>,
    views: ViewsConfig,
    logger: Logger,
    shutdown: Shutdown,
) -> io::Result<()> {
    let mut dashboard = Dashboard::new(store, hub, feed, views, logger);
    dashboard.initialize()?;
    let result = dashboard.run(shutdown).await;
    let restored = dashboard.shutdown();
    result.and(restored)
}

/// Label used by the event feed for degraded and recovered topics.
pub fn describe_health(event: &Event) -> Option<String> {
    match &event.kind {
        EventKind::StreamDegraded { retries, reason } => Some(format!(
            "{} degraded after {} failures: {}",
            event.topic, retries, reason
        )),
        EventKind::StreamRecovered => Some(format!("{} recovered", event.topic)),
        _ => None,
    }
}
