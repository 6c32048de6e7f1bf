// 🎓 Student registration & lookup

use tracing::info;

use super::load_current_student;
use crate::db::{self, Event};
use crate::entities::{validate_name, Student};
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::Ledger;

impl Ledger {
    /// Register a student with a fresh allowance for the current period
    pub fn create_student(&mut self, name: &str) -> LedgerResult<Student> {
        validate_name(name).map_err(LedgerError::Validation)?;

        let config = self.config;
        let period = self.current_period();

        let student = self.store.write(|tx| {
            if db::find_student_by_name(tx, name)?.is_some() {
                return Err(LedgerError::DuplicateName(name.to_string()));
            }

            let student = db::insert_student(tx, name, period, &config).map_err(|err| {
                if err.is_constraint_violation() {
                    LedgerError::DuplicateName(name.to_string())
                } else {
                    err
                }
            })?;

            db::insert_event(
                tx,
                &Event::new(
                    "student_created",
                    "student",
                    student.id,
                    serde_json::json!({
                        "name": student.name,
                        "period": period,
                        "available_credits": student.available_credits,
                    }),
                    "registration",
                ),
            )?;

            Ok(student)
        })?;

        info!(student_id = student.id, name = %student.name, "student registered");
        Ok(student)
    }

    /// Fetch a student as seen in the current period
    ///
    /// A stale allowance is reset and persisted before the student is returned.
    pub fn get_student(&mut self, id: i64) -> LedgerResult<Student> {
        let config = self.config;
        let period = self.current_period();

        self.store
            .write(|tx| load_current_student(tx, id, period, &config, "lookup"))
    }

    /// Look a student up by exact (case-sensitive) name, resetting like `get_student`
    pub fn find_student(&mut self, name: &str) -> LedgerResult<Student> {
        let config = self.config;
        let period = self.current_period();

        self.store.write(|tx| {
            let stored = db::find_student_by_name(tx, name)?
                .ok_or_else(|| LedgerError::NotFound(format!("student '{}'", name)))?;
            load_current_student(tx, stored.id, period, &config, "lookup")
        })
    }

    /// All students as stored, ordered by id (no reset applied)
    pub fn list_students(&mut self) -> LedgerResult<Vec<Student>> {
        self.store.read(|tx| db::all_students(tx))
    }
}
