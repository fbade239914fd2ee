//! Terminal front end for the door game.
//!
//! Game state lives in `.catchmaster/` under the project root: `config.toml`
//! (tunables, generator settings) and `history.json` (what the opponent
//! remembers about you across resets).

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;

use catchmaster::core::diary::{DIARY_UNLOCK_GAMES, build_diary, is_unlocked};
use catchmaster::core::history::GameHistory;
use catchmaster::core::moves::{DesperationMove, MoveState};
use catchmaster::core::state::Phase;
use catchmaster::core::timers::TimerKind;
use catchmaster::core::types::{DOOR_COUNT, StreakStats};
use catchmaster::io::config::{init_config, load_config};
use catchmaster::io::conversation::ConversationStore;
use catchmaster::io::generator::{TextGenerator, generator_from_config};
use catchmaster::io::history_store::{
    FileHistoryStore, HistoryStore, MemoryHistoryStore, load_or_fresh,
};
use catchmaster::io::paths::GamePaths;
use catchmaster::logging;
use catchmaster::narrator::{NarrationSource, Narrator};
use catchmaster::prompt::{build_prompt, door_history_lines};
use catchmaster::session::{MoveOutcome, Rejection, SelectionOutcome, Session};

#[derive(Parser)]
#[command(
    name = "catchmaster",
    version,
    about = "Three doors, one opponent who learns how you choose"
)]
struct Cli {
    /// Project root containing `.catchmaster/`.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Raise diagnostic verbosity on stderr (-v, -vv, -vvv).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write `.catchmaster/config.toml` with default settings.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Play an interactive game.
    Play {
        /// Seed the outcome dice for a reproducible game.
        #[arg(long)]
        seed: Option<u64>,
        /// Keep history in memory only.
        #[arg(long)]
        no_persist: bool,
    },
    /// Show what the opponent has written about you.
    Diary,
    /// Print the hint prompt composed for a stage.
    Prompt {
        #[arg(long)]
        stage: u32,
        #[arg(long, default_value_t = 0)]
        win_streak: u32,
        #[arg(long, default_value_t = 0)]
        loss_streak: u32,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    if let Err(err) = run(cli) {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let paths = GamePaths::new(cli.root);
    match cli.command {
        Command::Init { force } => cmd_init(&paths, force),
        Command::Play { seed, no_persist } => cmd_play(&paths, seed, no_persist),
        Command::Diary => cmd_diary(&paths),
        Command::Prompt {
            stage,
            win_streak,
            loss_streak,
        } => cmd_prompt(
            &paths,
            stage,
            StreakStats {
                win_streak,
                loss_streak,
            },
        ),
    }
}

fn cmd_init(paths: &GamePaths, force: bool) -> Result<()> {
    if init_config(&paths.config_path, force)? {
        println!("wrote {}", paths.config_path.display());
    } else {
        println!(
            "{} already exists (use --force to overwrite)",
            paths.config_path.display()
        );
    }
    Ok(())
}

fn cmd_play(paths: &GamePaths, seed: Option<u64>, no_persist: bool) -> Result<()> {
    let config = load_config(&paths.config_path)?;
    let dice = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let narrator = Narrator::new(
        generator_from_config(&config.generator),
        config.retry.clone(),
        ConversationStore::from_config(&config.conversation),
    );
    if no_persist {
        let session = Session::new(config, MemoryHistoryStore::new(), dice);
        play_loop(session, narrator)
    } else {
        let store = FileHistoryStore::new(&paths.history_path);
        let session = Session::new(config, store, dice);
        play_loop(session, narrator)
    }
}

fn cmd_diary(paths: &GamePaths) -> Result<()> {
    let history = load_or_fresh(&FileHistoryStore::new(&paths.history_path));
    print_diary(&history);
    Ok(())
}

fn cmd_prompt(paths: &GamePaths, stage: u32, streaks: StreakStats) -> Result<()> {
    if stage == 0 {
        bail!("--stage must be >= 1");
    }
    let config = load_config(&paths.config_path)?;
    let history = load_or_fresh(&FileHistoryStore::new(&paths.history_path));
    let prompt = build_prompt(
        stage,
        &door_history_lines(&history),
        streaks,
        config.intensity_step,
    )?;
    println!("{prompt}");
    Ok(())
}

/// A line of player input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlayCommand {
    Door(usize),
    Peek(usize),
    Beg,
    Trust(u8),
    Continue,
    Reset,
    Diary,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<PlayCommand, String> {
    let mut parts = line.split_whitespace();
    let Some(head) = parts.next() else {
        return Err("type a door number, or `help`".to_string());
    };
    let arg = parts.next();
    if parts.next().is_some() {
        return Err(format!("too many arguments: {line}"));
    }
    match (head.to_ascii_lowercase().as_str(), arg) {
        ("peek", Some(door)) => parse_door(door).map(PlayCommand::Peek),
        ("trust", Some(level)) => level
            .parse::<u8>()
            .ok()
            .filter(|level| *level <= 100)
            .map(PlayCommand::Trust)
            .ok_or_else(|| format!("trust must be 0-100, got {level}")),
        ("beg", None) => Ok(PlayCommand::Beg),
        ("continue" | "c", None) => Ok(PlayCommand::Continue),
        ("reset", None) => Ok(PlayCommand::Reset),
        ("diary", None) => Ok(PlayCommand::Diary),
        ("help" | "?", None) => Ok(PlayCommand::Help),
        ("quit" | "q" | "exit", None) => Ok(PlayCommand::Quit),
        (door, None) => parse_door(door).map(PlayCommand::Door),
        (other, Some(_)) => Err(format!("unknown command: {other}")),
    }
}

fn parse_door(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(n) if (1..=DOOR_COUNT).contains(&n) => Ok(n - 1),
        _ => Err(format!("doors are numbered 1-{DOOR_COUNT}, got {raw}")),
    }
}

fn play_loop<S, G>(mut session: Session<S, StdRng>, mut narrator: Narrator<G>) -> Result<()>
where
    S: HistoryStore,
    G: TextGenerator,
{
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    print_help();
    narrate(&mut session, &mut narrator);
    render(&session);

    loop {
        print!("> ");
        io::stdout().flush().context("flush stdout")?;
        let Some(line) = lines.next() else {
            break;
        };
        let line = line.context("read command")?;

        let fired = session.tick(Instant::now());
        for kind in &fired {
            debug!(?kind, "timer fired before command");
        }

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };

        let now = Instant::now();
        match command {
            PlayCommand::Door(door) => match session.select_door(door, now) {
                SelectionOutcome::Resolved(decision) => {
                    if decision.outcome.is_win() {
                        println!("Door {} opens onto the next corridor. You win this stage.", door + 1);
                    } else {
                        println!("Door {} was the wrong one.", door + 1);
                    }
                    wait_for_game_over(&mut session);
                }
                SelectionOutcome::Rejected(rejection) => {
                    println!("{}", describe(rejection));
                    continue;
                }
            },
            PlayCommand::Peek(door) => match session.use_peek(door, now) {
                MoveOutcome::Peeked { door, preview } => {
                    println!(
                        "You glimpse behind door {}: it looks like a {}.",
                        door + 1,
                        preview.as_str()
                    );
                }
                MoveOutcome::Rejected(rejection) => {
                    println!("{}", describe(rejection));
                    continue;
                }
                MoveOutcome::Begged => {}
            },
            PlayCommand::Beg => match session.use_beg() {
                MoveOutcome::Rejected(rejection) => {
                    println!("{}", describe(rejection));
                    continue;
                }
                _ => println!("You beg. The opponent considers your next door."),
            },
            PlayCommand::Trust(level) => session.set_doubt_level(level),
            PlayCommand::Continue => {
                if !advanced_or_continued(&fired, || session.continue_game()) {
                    println!("Nothing to continue yet.");
                    continue;
                }
            }
            PlayCommand::Reset => {
                session.reset_game();
                println!("Everything is forgotten. Probably.");
            }
            PlayCommand::Diary => {
                print_diary(session.history());
                continue;
            }
            PlayCommand::Help => {
                print_help();
                continue;
            }
            PlayCommand::Quit => break,
        }

        if session.phase() != Phase::GameOver {
            narrate(&mut session, &mut narrator);
        }
        render(&session);
    }
    Ok(())
}

/// Block until a pending game-over fires so the final screen is shown.
/// `continue` typed after the auto-advance already fired counts as done.
fn advanced_or_continued(fired: &[TimerKind], continue_game: impl FnOnce() -> bool) -> bool {
    fired.contains(&TimerKind::AutoAdvance) || continue_game()
}

fn wait_for_game_over<S: HistoryStore>(session: &mut Session<S, StdRng>) {
    if session.phase() != Phase::Resolved {
        return;
    }
    if let Some(due) = session.next_timer_due() {
        thread::sleep(due.saturating_duration_since(Instant::now()));
        session.tick(due);
    }
}

fn narrate<S: HistoryStore, G: TextGenerator>(
    session: &mut Session<S, StdRng>,
    narrator: &mut Narrator<G>,
) {
    let request = session.hint_request();
    let narration = narrator.narrate(&request, Instant::now());
    if narration.source == NarrationSource::Fallback {
        debug!("showing fallback hint");
    }
    session.apply_hint(request.ticket, &narration.text);
}

fn render<S: HistoryStore>(session: &Session<S, StdRng>) {
    let state = session.state();
    println!();
    if state.is_game_over {
        println!(
            "GAME OVER after stage {}: {} wins, {} losses. Type `reset` to play again.",
            state.stage, state.wins, state.losses
        );
        return;
    }
    let mut status = format!(
        "Stage {} ({}) | opponent: {} | wins {} losses {} | trust {}",
        state.stage,
        state.stage_type.as_str(),
        session.personality().as_str(),
        state.wins,
        state.losses,
        state.doubt_level
    );
    if let Some(lives) = state.lives {
        status.push_str(&format!(" | lives {lives}"));
    }
    println!("{status}");

    let doors: Vec<String> = state
        .door_results
        .iter()
        .enumerate()
        .map(|(idx, result)| match result {
            Some(outcome) => format!("[{}: {}]", idx + 1, outcome.as_str()),
            None => format!("[{}]", idx + 1),
        })
        .collect();
    println!("{}", doors.join(" "));

    let moves = session.moves();
    let available: Vec<&str> = [DesperationMove::Peek, DesperationMove::Beg]
        .into_iter()
        .filter(|kind| moves.state(*kind) == MoveState::Available)
        .map(DesperationMove::as_str)
        .collect();
    if !available.is_empty() {
        println!("desperation moves: {}", available.join(", "));
    }
    if session.phase() == Phase::AwaitingContinue {
        println!("(type `continue` for the next stage)");
    }
    println!("\"{}\"", state.message);
}

fn print_diary(history: &GameHistory) {
    if !is_unlocked(history) {
        let left = DIARY_UNLOCK_GAMES.saturating_sub(history.games_played);
        println!("The diary is locked. Reset {left} more time(s).");
        return;
    }
    let report = build_diary(history);
    println!("Door preference:");
    for (idx, pct) in report.door_percentages.iter().enumerate() {
        let marker = if idx == report.favorite_door { " *" } else { "" };
        println!("  door {}: {pct}%{marker}", idx + 1);
    }
    println!("Patterns:");
    for line in &report.patterns {
        println!("  - {line}");
    }
    println!("Thoughts:");
    for line in &report.thoughts {
        println!("  \"{line}\"");
    }
}

fn print_help() {
    println!("commands: 1|2|3, peek N, beg, trust N, continue, reset, diary, quit");
}

fn describe(rejection: Rejection) -> String {
    match rejection {
        Rejection::Processing => "Wait for the current door to resolve.".to_string(),
        Rejection::InvalidDoor(door) => format!("There is no door {}.", door + 1),
        Rejection::DoorAlreadyOpened => {
            "You already opened a door this stage. Type `continue`.".to_string()
        }
        Rejection::WrongPhase(phase) => format!("Not now ({phase:?})."),
        Rejection::GameOver => "The game is over. Type `reset`.".to_string(),
        Rejection::MoveUnavailable(kind) => format!("{} is not available.", kind.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_door_numbers_one_based() {
        assert_eq!(parse_command("2"), Ok(PlayCommand::Door(1)));
        assert_eq!(parse_command(" peek 3 "), Ok(PlayCommand::Peek(2)));
        assert!(parse_command("4").is_err());
        assert!(parse_command("peek 0").is_err());
    }

    #[test]
    fn parses_keywords() {
        assert_eq!(parse_command("BEG"), Ok(PlayCommand::Beg));
        assert_eq!(parse_command("trust 80"), Ok(PlayCommand::Trust(80)));
        assert!(parse_command("trust 101").is_err());
        assert_eq!(parse_command("c"), Ok(PlayCommand::Continue));
        assert_eq!(parse_command("quit"), Ok(PlayCommand::Quit));
        assert!(parse_command("").is_err());
        assert!(parse_command("reset now").is_err());
    }

    #[test]
    fn continue_after_auto_advance_is_not_an_error() {
        assert!(advanced_or_continued(&[TimerKind::AutoAdvance], || {
            panic!("stage already advanced")
        }));
        assert!(!advanced_or_continued(&[TimerKind::PeekWindowEnd], || false));
        assert!(advanced_or_continued(&[], || true));
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::try_parse_from([
            "catchmaster",
            "play",
            "--seed",
            "7",
            "--root",
            "/tmp/x",
            "-vv",
        ])
        .expect("parse");
        assert_eq!(cli.root, PathBuf::from("/tmp/x"));
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Command::Play {
                seed: Some(7),
                no_persist: false
            }
        ));
    }
}
