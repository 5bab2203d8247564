use anyhow::{Context, Result};
use std::io::Write;

use crate::models::Job;

/// What the human decided about a scraped job.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewDecision {
    Proceed,
    Skip,
    /// Already applied elsewhere; short-circuit straight to Applied.
    Duplicate,
    SwapResume(String),
}

/// Human interaction contract. Stages only ever talk to this trait, so bulk
/// runs can pass a non-interactive policy and tests can script decisions.
pub trait Prompter {
    fn confirm(&mut self, message: &str, default: bool) -> Result<bool>;
    fn choose(&mut self, message: &str, options: &[String]) -> Result<usize>;
    fn input(&mut self, message: &str, default: &str) -> Result<String>;
}

/// Stdin-backed prompter for interactive runs.
pub struct TerminalPrompter;

impl TerminalPrompter {
    fn read_line(&self) -> Result<String> {
        let mut line = String::new();
        std::io::stdin()
            .read_line(&mut line)
            .context("Failed to read from stdin")?;
        Ok(line.trim().to_string())
    }
}

impl Prompter for TerminalPrompter {
    fn confirm(&mut self, message: &str, default: bool) -> Result<bool> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        print!("{message} {hint} ");
        std::io::stdout().flush()?;
        let line = self.read_line()?.to_lowercase();
        Ok(match line.as_str() {
            "" => default,
            "y" | "yes" => true,
            _ => false,
        })
    }

    fn choose(&mut self, message: &str, options: &[String]) -> Result<usize> {
        println!("{message}");
        for (i, option) in options.iter().enumerate() {
            println!("  {}) {}", i + 1, option);
        }
        loop {
            print!("> ");
            std::io::stdout().flush()?;
            let line = self.read_line()?;
            if let Ok(n) = line.parse::<usize>() {
                if n >= 1 && n <= options.len() {
                    return Ok(n - 1);
                }
            }
            println!("Pick a number between 1 and {}.", options.len());
        }
    }

    fn input(&mut self, message: &str, default: &str) -> Result<String> {
        if default.is_empty() {
            print!("{message}: ");
        } else {
            print!("{message} [{default}]: ");
        }
        std::io::stdout().flush()?;
        let line = self.read_line()?;
        Ok(if line.is_empty() {
            default.to_string()
        } else {
            line
        })
    }
}

/// Ask the review question for one job: proceed, skip, duplicate, or swap the
/// resume (picked from the available ones).
pub fn review_prompt(
    prompter: &mut dyn Prompter,
    job: &Job,
    resumes: &[String],
) -> Result<ReviewDecision> {
    let mut options = vec![
        "Proceed with this job".to_string(),
        "Skip (not interested)".to_string(),
        "Already applied (mark as duplicate)".to_string(),
    ];
    if !resumes.is_empty() {
        options.push("Swap resume".to_string());
    }

    match prompter.choose(&format!("Reviewing: {}", job.title), &options)? {
        0 => Ok(ReviewDecision::Proceed),
        1 => Ok(ReviewDecision::Skip),
        2 => Ok(ReviewDecision::Duplicate),
        _ => {
            let pick = prompter.choose("Pick a resume to use:", resumes)?;
            Ok(ReviewDecision::SwapResume(resumes[pick].clone()))
        }
    }
}

/// Boxed summary of a job and its extracted details, shown before decisions.
pub fn print_job_details(job: &Job) {
    let line = "-".repeat(72);
    println!("{line}");
    println!("{} (#{})", job.title, job.id);
    println!("{}", job.link);
    if let Some(resume) = &job.resume {
        println!("Resume: {resume}");
    }

    if let Some(details) = &job.details {
        if !details.summary.is_empty() {
            println!();
            for wrapped in textwrap::wrap(&details.summary, 70) {
                println!("{wrapped}");
            }
        }
        println!();
        if !details.location.is_empty() {
            println!("Location:    {}", details.location);
        }
        println!("Remote:      {}", details.remote);
        if !details.job_type.is_empty() {
            println!("Job type:    {}", details.job_type);
        }
        if !details.experience.is_empty() {
            println!("Experience:  {}", details.experience);
        }
        if !details.salary.is_empty() {
            println!("Salary:      {}", details.salary);
        }
        if !details.technical_skills.is_empty() {
            println!("Skills:      {}", details.technical_skills.join(" | "));
        }
    }
    println!("{line}");
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Scripted prompter: pops pre-seeded responses in order.
    #[derive(Default)]
    pub struct ScriptedPrompter {
        pub confirms: Vec<bool>,
        pub choices: Vec<usize>,
        pub inputs: Vec<String>,
    }

    impl Prompter for ScriptedPrompter {
        fn confirm(&mut self, _message: &str, _default: bool) -> Result<bool> {
            Ok(self.confirms.remove(0))
        }

        fn choose(&mut self, _message: &str, _options: &[String]) -> Result<usize> {
            Ok(self.choices.remove(0))
        }

        fn input(&mut self, _message: &str, default: &str) -> Result<String> {
            if self.inputs.is_empty() {
                Ok(default.to_string())
            } else {
                Ok(self.inputs.remove(0))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::ScriptedPrompter;
    use super::*;
    use crate::models::Status;

    fn job() -> Job {
        Job {
            id: 1,
            search_id: 1,
            title: "Backend Engineer".to_string(),
            link: "https://jobs.lever.co/acme/x".to_string(),
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
    fn test_review_prompt_maps_choices_to_decisions() {
        let resumes = vec!["a.pdf".to_string(), "b.pdf".to_string()];

        let mut prompter = ScriptedPrompter {
            choices: vec![0],
            ..Default::default()
        };
        let decision = review_prompt(&mut prompter, &job(), &resumes).unwrap();
        assert_eq!(decision, ReviewDecision::Proceed);

        let mut prompter = ScriptedPrompter {
            choices: vec![1],
            ..Default::default()
        };
        let decision = review_prompt(&mut prompter, &job(), &resumes).unwrap();
        assert_eq!(decision, ReviewDecision::Skip);

        let mut prompter = ScriptedPrompter {
            choices: vec![2],
            ..Default::default()
        };
        let decision = review_prompt(&mut prompter, &job(), &resumes).unwrap();
        assert_eq!(decision, ReviewDecision::Duplicate);

        // Swap asks a second question: which resume.
        let mut prompter = ScriptedPrompter {
            choices: vec![3, 1],
            ..Default::default()
        };
        let decision = review_prompt(&mut prompter, &job(), &resumes).unwrap();
        assert_eq!(decision, ReviewDecision::SwapResume("b.pdf".to_string()));
    }

    #[test]
    fn test_review_prompt_hides_swap_without_resumes() {
        // With no resumes on disk, the fourth option is not offered, so the
        // scripted choice of the last index maps to Duplicate.
        let mut prompter = ScriptedPrompter {
            choices: vec![2],
            ..Default::default()
        };
        let decision = review_prompt(&mut prompter, &job(), &[]).unwrap();
        assert_eq!(decision, ReviewDecision::Duplicate);
    }
}
