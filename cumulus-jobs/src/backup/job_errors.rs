use crate::{error_chain, Error};
use cumulus_core::model::job;
use std::{collections::BTreeMap, fmt};

#[derive(Debug, Default)]
pub struct JobErrors {
    errors: BTreeMap<job::Name, Error>,
}

impl JobErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the failure of `job`, replacing an earlier one for the same job.
    pub fn add(&mut self, job: job::Name, error: Error) {
        self.errors.insert(job, error);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn get(&self, job: &job::Name) -> Option<&Error> {
        self.errors.get(job)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&job::Name, &Error)> {
        self.errors.iter()
    }

    pub fn into_result(self) -> Result<(), Error> {
        if self.has_errors() {
            Err(Error::Jobs(self))
        } else {
            Ok(())
        }
    }
}

impl fmt::Display for JobErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (name, error)) in self.errors.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{} failed: {}", name, error_chain(error))?;
        }
        Ok(())
    }
}

impl std::error::Error for JobErrors {}
