mod ui;
mod widgets;

use std::io;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::db::Database;
use crate::knowledge::SectionMastery;
use crate::models::{FlashcardProgress, KnowledgeState};
use crate::scheduler::{prioritize, DeckStats};
use crate::state::LearnerState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Dashboard,
    Topics,
    Cards,
}

impl View {
    fn next(&self) -> Self {
        match self {
            View::Dashboard => View::Topics,
            View::Topics => View::Cards,
            View::Cards => View::Dashboard,
        }
    }

    fn prev(&self) -> Self {
        match self {
            View::Dashboard => View::Cards,
            View::Topics => View::Dashboard,
            View::Cards => View::Topics,
        }
    }
}

pub struct StatefulList<T> {
    pub items: Vec<T>,
    pub selected: Option<usize>,
}

impl<T> StatefulList<T> {
    fn with_items(items: Vec<T>) -> Self {
        let selected = if items.is_empty() { None } else { Some(0) };
        Self { items, selected }
    }

    fn next(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.selected {
            Some(i) if i + 1 < self.items.len() => i + 1,
            _ => 0,
        };
        self.selected = Some(i);
    }

    fn previous(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.selected {
            Some(0) | None => self.items.len() - 1,
            Some(i) => i - 1,
        };
        self.selected = Some(i);
    }

    fn first(&mut self) {
        if !self.items.is_empty() {
            self.selected = Some(0);
        }
    }

    fn last(&mut self) {
        if !self.items.is_empty() {
            self.selected = Some(self.items.len() - 1);
        }
    }
}

/// Read-only view over one learner snapshot.
pub struct App {
    db: Database,
    pub view: View,
    pub today: NaiveDate,
    pub topics: StatefulList<KnowledgeState>,
    pub cards: StatefulList<FlashcardProgress>,
    pub weak_topics: Vec<KnowledgeState>,
    pub due_cards: Vec<FlashcardProgress>,
    pub overall: SectionMastery,
    pub deck: DeckStats,
    pub diagnostic: Option<(String, usize, bool)>,
    pub should_quit: bool,
}

impl App {
    pub fn new(db: Database) -> Result<Self, Box<dyn std::error::Error>> {
        let state = db.load_snapshot()?;
        let today = Local::now().date_naive();
        Ok(Self::from_state(db, &state, today))
    }

    fn from_state(db: Database, state: &LearnerState, today: NaiveDate) -> Self {
        let mut app = Self {
            db,
            view: View::Dashboard,
            today,
            topics: StatefulList::with_items(Vec::new()),
            cards: StatefulList::with_items(Vec::new()),
            weak_topics: Vec::new(),
            due_cards: Vec::new(),
            overall: state.overall_mastery(),
            deck: state.card_stats(today),
            diagnostic: None,
            should_quit: false,
        };
        app.load(state);
        app
    }

    fn load(&mut self, state: &LearnerState) {
        self.overall = state.overall_mastery();
        self.deck = state.card_stats(self.today);
        self.topics = StatefulList::with_items(state.knowledge_states.values().cloned().collect());

        let mut cards: Vec<&FlashcardProgress> = state.flashcard_progress.values().collect();
        prioritize(&mut cards, self.today);
        self.cards = StatefulList::with_items(cards.into_iter().cloned().collect());

        self.weak_topics = state.weak_topics().into_iter().cloned().collect();
        self.due_cards = state.due_cards(self.today).into_iter().cloned().collect();
        self.diagnostic = state
            .diagnostic_session
            .as_ref()
            .map(|s| (s.subject_id.clone(), s.answers.len(), s.is_completed()));
    }

    pub fn refresh_data(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let state = self.db.load_snapshot()?;
        self.today = Local::now().date_naive();
        self.load(&state);
        Ok(())
    }

    fn selected_list_next(&mut self) {
        match self.view {
            View::Topics => self.topics.next(),
            View::Cards => self.cards.next(),
            View::Dashboard => {}
        }
    }

    fn selected_list_previous(&mut self) {
        match self.view {
            View::Topics => self.topics.previous(),
            View::Cards => self.cards.previous(),
            View::Dashboard => {}
        }
    }

    fn handle_key(
        &mut self,
        key: KeyCode,
        modifiers: KeyModifiers,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match key {
            KeyCode::Char('q') => self.should_quit = true,

            KeyCode::Char('r') if modifiers.contains(KeyModifiers::CONTROL) => {
                self.refresh_data()?;
            }

            KeyCode::Char('h') | KeyCode::Left | KeyCode::BackTab => self.view = self.view.prev(),
            KeyCode::Char('l') | KeyCode::Right => self.view = self.view.next(),
            KeyCode::Tab => {
                if modifiers.contains(KeyModifiers::SHIFT) {
                    self.view = self.view.prev();
                } else {
                    self.view = self.view.next();
                }
            }

            KeyCode::Char('j') | KeyCode::Down => self.selected_list_next(),
            KeyCode::Char('k') | KeyCode::Up => self.selected_list_previous(),

            KeyCode::Char('g') => match self.view {
                View::Topics => self.topics.first(),
                View::Cards => self.cards.first(),
                View::Dashboard => {}
            },
            KeyCode::Char('G') => match self.view {
                View::Topics => self.topics.last(),
                View::Cards => self.cards.last(),
                View::Dashboard => {}
            },

            _ => {}
        }
        Ok(())
    }
}

pub fn run(db: Database) -> Result<(), Box<dyn std::error::Error>> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = App::new(db).and_then(|mut app| run_app(&mut terminal, &mut app));

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key.code, key.modifiers)?;
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Quality;
    use chrono::Utc;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn app_with(state: &LearnerState) -> App {
        let db = Database::open(":memory:").unwrap();
        db.init().unwrap();
        db.save_snapshot(state).unwrap();
        App::from_state(db, state, day(10))
    }

    fn sample_state() -> LearnerState {
        let mut state = LearnerState::new();
        let now = Utc::now();
        state.record_answer("weak", false, now);
        state.set_topic_score("strong", 9, 10, now).unwrap();
        state.review_card("due", "weak", "s", Quality::DONT_KNOW, day(10));
        state.review_card("later", "strong", "s", Quality::EASY, day(10));
        state
    }

    mod list_tests {
        use super::*;

        #[test]
        fn next_and_previous_wrap() {
            let mut list = StatefulList::with_items(vec![1, 2, 3]);
            assert_eq!(list.selected, Some(0));
            list.previous();
            assert_eq!(list.selected, Some(2));
            list.next();
            assert_eq!(list.selected, Some(0));
        }

        #[test]
        fn empty_list_has_no_selection() {
            let mut list: StatefulList<u8> = StatefulList::with_items(Vec::new());
            list.next();
            list.last();
            assert_eq!(list.selected, None);
        }
    }

    mod app_tests {
        use super::*;

        #[test]
        fn loads_snapshot_views() {
            let app = app_with(&sample_state());
            assert_eq!(app.topics.items.len(), 2);
            assert_eq!(app.weak_topics.len(), 1);
            assert_eq!(app.weak_topics[0].topic_id, "weak");
            assert_eq!(app.due_cards.len(), 1);
            assert_eq!(app.cards.items[0].card_id, "due");
            assert_eq!(app.deck.total, 2);
        }

        #[test]
        fn vim_keys_move_between_views_and_rows() {
            let mut app = app_with(&sample_state());
            app.handle_key(KeyCode::Char('l'), KeyModifiers::NONE).unwrap();
            assert_eq!(app.view, View::Topics);
            app.handle_key(KeyCode::Char('G'), KeyModifiers::NONE).unwrap();
            assert_eq!(app.topics.selected, Some(1));
            app.handle_key(KeyCode::Char('g'), KeyModifiers::NONE).unwrap();
            assert_eq!(app.topics.selected, Some(0));
            app.handle_key(KeyCode::Char('h'), KeyModifiers::NONE).unwrap();
            app.handle_key(KeyCode::Char('h'), KeyModifiers::NONE).unwrap();
            assert_eq!(app.view, View::Cards);
            app.handle_key(KeyCode::Char('q'), KeyModifiers::NONE).unwrap();
            assert!(app.should_quit);
        }

        #[test]
        fn ctrl_r_reloads_from_database() {
            let mut app = app_with(&LearnerState::new());
            assert!(app.topics.items.is_empty());

            let mut state = LearnerState::new();
            state.record_answer("fresh", true, Utc::now());
            app.db.save_snapshot(&state).unwrap();

            app.handle_key(KeyCode::Char('r'), KeyModifiers::CONTROL).unwrap();
            assert_eq!(app.topics.items.len(), 1);
        }
    }
}
