use std::fmt;

use super::types::{Finding, Location};

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.start_line)?;
        if self.end_line != self.start_line {
            write!(f, "-{}", self.end_line)?;
        }
        Ok(())
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}) at {}",
            self.severity(),
            self.title,
            self.rule_name,
            self.location
        )?;
        if let Some(function) = &self.location.function {
            write!(f, " in `{}`", function)?;
        }
        Ok(())
    }
}
