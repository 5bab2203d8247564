use anyhow::Result;
use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io::stdout;

use crate::db::Database;
use crate::models::Job;
use crate::pipeline::review::apply_decision;
use crate::ui::ReviewDecision;

struct AppState {
    jobs: Vec<Job>,
    selected: usize,
    scroll_offset: u16,
    resumes: Vec<String>,
    reviewed: usize,
}

impl AppState {
    fn new(jobs: Vec<Job>, resumes: Vec<String>) -> Self {
        Self {
            jobs,
            selected: 0,
            scroll_offset: 0,
            resumes,
            reviewed: 0,
        }
    }

    fn current_job(&self) -> Option<&Job> {
        self.jobs.get(self.selected)
    }

    fn next(&mut self) {
        if !self.jobs.is_empty() && self.selected < self.jobs.len() - 1 {
            self.selected += 1;
            self.scroll_offset = 0;
        }
    }

    fn prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.scroll_offset = 0;
        }
    }

    fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }

    /// Cycle the current job's resume through the available files.
    fn cycle_resume(&mut self) -> Option<&Job> {
        if self.resumes.is_empty() {
            return None;
        }
        let resumes = &self.resumes;
        let job = self.jobs.get_mut(self.selected)?;
        let next_idx = match &job.resume {
            Some(current) => resumes
                .iter()
                .position(|r| r == current)
                .map(|i| (i + 1) % resumes.len())
                .unwrap_or(0),
            None => 0,
        };
        job.resume = Some(resumes[next_idx].clone());
        Some(job)
    }

    /// Apply a review decision to the current job and drop it from the list.
    fn decide(&mut self, decision: ReviewDecision) -> Option<Job> {
        if self.jobs.is_empty() {
            return None;
        }
        let mut job = self.jobs.remove(self.selected);
        apply_decision(&mut job, decision);
        if self.selected >= self.jobs.len() && self.selected > 0 {
            self.selected -= 1;
        }
        self.scroll_offset = 0;
        self.reviewed += 1;
        Some(job)
    }
}

/// Full-screen review browser over Scraped jobs. Every decision is persisted
/// immediately; quitting leaves the remaining jobs untouched.
pub fn run_review(db: &Database, jobs: Vec<Job>, resumes: Vec<String>) -> Result<()> {
    let mut state = AppState::new(jobs, resumes);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state, db);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    println!("Reviewed {} job(s).", state.reviewed);
    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
    db: &Database,
) -> Result<()> {
    let mut list_state = ListState::default();
    list_state.select(Some(0));

    loop {
        if state.jobs.is_empty() {
            return Ok(());
        }
        terminal.draw(|frame| draw(frame, state, &mut list_state))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Down | KeyCode::Char('j') => state.next(),
                KeyCode::Up | KeyCode::Char('k') => state.prev(),
                KeyCode::Char('J') | KeyCode::PageDown => state.scroll_down(),
                KeyCode::Char('K') | KeyCode::PageUp => state.scroll_up(),
                KeyCode::Char('p') | KeyCode::Enter => {
                    if let Some(job) = state.decide(ReviewDecision::Proceed) {
                        db.update_job(&job)?;
                    }
                }
                KeyCode::Char('s') => {
                    if let Some(job) = state.decide(ReviewDecision::Skip) {
                        db.update_job(&job)?;
                    }
                }
                KeyCode::Char('d') => {
                    if let Some(job) = state.decide(ReviewDecision::Duplicate) {
                        db.update_job(&job)?;
                    }
                }
                KeyCode::Char('r') => {
                    if let Some(job) = state.cycle_resume() {
                        db.update_job(job)?;
                    }
                }
                _ => {}
            }
            list_state.select(Some(state.selected));
        }
    }
}

fn draw(frame: &mut Frame, state: &AppState, list_state: &mut ListState) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(frame.area());

    // Left panel: job list
    let items: Vec<ListItem> = state
        .jobs
        .iter()
        .map(|job| {
            let title = if job.title.len() > 35 {
                format!("{}...", &job.title[..32])
            } else {
                job.title.clone()
            };
            let company = job
                .details
                .as_ref()
                .map(|d| d.company_name.as_str())
                .filter(|c| !c.is_empty())
                .unwrap_or("?");
            ListItem::new(format!("#{:<4} {} | {}", job.id, title, company))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" To review ({}) ", state.jobs.len())),
        )
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, chunks[0], list_state);

    // Right panel: job detail
    let detail = build_detail(state);
    let detail_widget = Paragraph::new(detail)
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));

    frame.render_widget(detail_widget, chunks[1]);

    // Footer help
    let help_area = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    let help = Paragraph::new(
        " j/k:navigate  J/K:scroll  p:proceed  s:skip  d:duplicate  r:swap resume  q:quit",
    )
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, help_area[1]);
}

fn build_detail<'a>(state: &'a AppState) -> Text<'a> {
    let Some(job) = state.current_job() else {
        return Text::raw("No job selected");
    };

    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::from(Span::styled(
        &job.title,
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(job.link.clone()));
    lines.push(Line::from(Span::styled(
        format!(
            "Resume: {}",
            job.resume.as_deref().unwrap_or("(none, press r)")
        ),
        Style::default().fg(Color::Yellow),
    )));
    lines.push(Line::from(""));

    if let Some(details) = &job.details {
        if !details.summary.is_empty() {
            for line in textwrap::fill(&details.summary, 70).lines() {
                lines.push(Line::from(line.to_string()));
            }
            lines.push(Line::from(""));
        }

        let facts = [
            ("Company", details.company_name.as_str()),
            ("Location", details.location.as_str()),
            ("Job type", details.job_type.as_str()),
            ("Seniority", details.seniority.as_str()),
            ("Experience", details.experience.as_str()),
            ("Salary", details.salary.as_str()),
        ];
        for (label, value) in facts {
            if !value.is_empty() {
                lines.push(Line::from(format!("{label}: {value}")));
            }
        }
        lines.push(Line::from(format!("Remote: {}", details.remote)));

        if !details.technical_skills.is_empty() {
            lines.push(Line::from(Span::styled(
                format!("Skills: {}", details.technical_skills.join(" | ")),
                Style::default().fg(Color::Cyan),
            )));
        }
        lines.push(Line::from(""));
    }

    if !job.custom_fields.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("{} custom question(s) on the application", job.custom_fields.len()),
            Style::default().fg(Color::Magenta),
        )));
        lines.push(Line::from(""));
    }

    if let Some(description) = &job.description {
        lines.push(Line::from(Span::styled(
            "Description",
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for line in description.lines() {
            lines.push(Line::from(line.to_string()));
        }
    } else {
        lines.push(Line::from(Span::styled(
            "(No description scraped)",
            Style::default().fg(Color::DarkGray),
        )));
    }

    Text::from(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Status;

    fn job(id: i64) -> Job {
        Job {
            id,
            search_id: 1,
            title: format!("Engineer {id}"),
            link: format!("https://jobs.lever.co/acme/{id}"),
            description: None,
            details: None,
            board: "lever".to_string(),
            resume: None,
            custom_fields: vec![],
            custom_fields_answers: vec![],
            status: Status::Scraped,
            timestamp: String::new(),
        }
    }

    #[test]
    fn test_decide_removes_job_and_keeps_selection_valid() {
        let mut state = AppState::new(vec![job(1), job(2)], vec![]);
        state.selected = 1;

        let decided = state.decide(ReviewDecision::Proceed).unwrap();
        assert_eq!(decided.id, 2);
        assert_eq!(decided.status, Status::Reviewed);
        assert_eq!(state.jobs.len(), 1);
        assert_eq!(state.selected, 0);
    }

    #[test]
    fn test_cycle_resume_wraps_around() {
        let resumes = vec!["a.pdf".to_string(), "b.pdf".to_string()];
        let mut state = AppState::new(vec![job(1)], resumes);

        state.cycle_resume();
        assert_eq!(state.jobs[0].resume.as_deref(), Some("a.pdf"));
        state.cycle_resume();
        assert_eq!(state.jobs[0].resume.as_deref(), Some("b.pdf"));
        state.cycle_resume();
        assert_eq!(state.jobs[0].resume.as_deref(), Some("a.pdf"));
    }

    #[test]
    fn test_cycle_resume_without_files_is_a_noop() {
        let mut state = AppState::new(vec![job(1)], vec![]);
        assert!(state.cycle_resume().is_none());
        assert_eq!(state.jobs[0].resume, None);
    }
}
