use super::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{
    format_timestamp, CountBucket, ListTasksQuery, NewTask, SortDirection, SortField, Task, TaskFilter,
    TaskId, TaskPatch, TaskPriority, TaskStatus,
};
use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

const TASK_COLUMNS: &str =
    "id, title, description, status, priority, due_date, completed, created_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupColumn {
    Status,
    Priority,
}

impl GroupColumn {
    fn grouped_count_sql(self) -> &'static str {
        match self {
            Self::Status => {
                "SELECT status, COUNT(*) FROM tasks GROUP BY status ORDER BY COUNT(*) DESC, status ASC"
            }
            Self::Priority => {
                "SELECT priority, COUNT(*) FROM tasks GROUP BY priority ORDER BY COUNT(*) DESC, priority ASC"
            }
        }
    }
}

impl Database {
    pub fn insert_task(&self, input: NewTask) -> AppResult<Task> {
        let now = now_millis();
        let mut task = Task {
            id: Uuid::new_v4(),
            title: input.title,
            description: input.description,
            status: input.status,
            priority: input.priority,
            due_date: input.due_date,
            completed: input.completed,
            created_at: now,
            updated_at: now,
        };
        task.sync_completion();

        let conn = self.lock()?;
        conn.execute(
            &format!("INSERT INTO tasks ({TASK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
            params![
                task.id.to_string(),
                task.title,
                task.description,
                task.status.as_str(),
                task.priority.as_str(),
                task.due_date.as_ref().map(format_timestamp),
                task.completed,
                format_timestamp(&task.created_at),
                format_timestamp(&task.updated_at),
            ],
        )?;

        Ok(task)
    }

    pub fn get_task(&self, id: TaskId) -> AppResult<Option<Task>> {
        let conn = self.lock()?;
        select_task(&conn, id)
    }

    /// Replaces the supplied fields, re-applies the completion rule and
    /// refreshes `updated_at`.
    pub fn update_task(&self, id: TaskId, patch: TaskPatch) -> AppResult<Task> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let Some(mut task) = select_task(&tx, id)? else {
            return Err(AppError::task_not_found());
        };
        patch.apply(&mut task);
        task.sync_completion();
        task.updated_at = now_millis().max(task.created_at);

        tx.execute(
            "UPDATE tasks
             SET title = ?1, description = ?2, status = ?3, priority = ?4, due_date = ?5,
                 completed = ?6, updated_at = ?7
             WHERE id = ?8",
            params![
                task.title,
                task.description,
                task.status.as_str(),
                task.priority.as_str(),
                task.due_date.as_ref().map(format_timestamp),
                task.completed,
                format_timestamp(&task.updated_at),
                task.id.to_string(),
            ],
        )?;
        tx.commit()?;

        Ok(task)
    }

    pub fn delete_task(&self, id: TaskId) -> AppResult<()> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM tasks WHERE id = ?1", [id.to_string()])?;
        if changed == 0 {
            return Err(AppError::task_not_found());
        }
        Ok(())
    }

    /// Returns one page of matching tasks plus the unpaged match count.
    pub fn list_tasks(&self, query: &ListTasksQuery) -> AppResult<(Vec<Task>, u64)> {
        let (where_clause, params_vec) = filter_clause(&query.filter);

        let conn = self.lock()?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM tasks{where_clause}"),
            rusqlite::params_from_iter(params_vec.iter()),
            |row| row.get(0),
        )?;

        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks{where_clause} ORDER BY {} {}, rowid DESC LIMIT ? OFFSET ?",
            sort_expression(query.sort.field),
            match query.sort.direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            },
        );
        let limit = i64::from(query.limit);
        let offset = i64::try_from(query.offset()).unwrap_or(i64::MAX);

        let mut statement = conn.prepare(&sql)?;
        let mut dyn_params: Vec<&dyn rusqlite::ToSql> = params_vec
            .iter()
            .map(|param| param as &dyn rusqlite::ToSql)
            .collect();
        dyn_params.push(&limit);
        dyn_params.push(&offset);

        let rows = statement.query_map(dyn_params.as_slice(), parse_task_row)?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }

        Ok((items, u64::try_from(total).unwrap_or_default()))
    }

    /// Counts every task grouped by one column. Values with no tasks are
    /// omitted.
    pub fn count_tasks_by(&self, column: GroupColumn) -> AppResult<Vec<CountBucket>> {
        let conn = self.lock()?;
        let mut statement = conn.prepare(column.grouped_count_sql())?;
        let rows = statement.query_map([], |row| {
            let count: i64 = row.get(1)?;
            Ok(CountBucket {
                key: row.get(0)?,
                count: u64::try_from(count).unwrap_or_default(),
            })
        })?;

        let mut buckets = Vec::new();
        for row in rows {
            buckets.push(row?);
        }
        Ok(buckets)
    }
}

fn select_task(conn: &Connection, id: TaskId) -> AppResult<Option<Task>> {
    conn.query_row(
        &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
        [id.to_string()],
        parse_task_row,
    )
    .optional()
    .map_err(AppError::from)
}

fn filter_clause(filter: &TaskFilter) -> (String, Vec<String>) {
    let mut clause = String::from(" WHERE 1 = 1");
    let mut params_vec = Vec::new();

    if let Some(status) = filter.status {
        clause.push_str(" AND status = ?");
        params_vec.push(status.as_str().to_string());
    }
    if let Some(priority) = filter.priority {
        clause.push_str(" AND priority = ?");
        params_vec.push(priority.as_str().to_string());
    }

    (clause, params_vec)
}

fn sort_expression(field: SortField) -> &'static str {
    match field {
        SortField::CreatedAt => "created_at",
        SortField::UpdatedAt => "updated_at",
        SortField::DueDate => "due_date",
        SortField::Title => "title COLLATE NOCASE",
        SortField::Status => {
            "CASE status WHEN 'pending' THEN 0 WHEN 'in-progress' THEN 1 WHEN 'completed' THEN 2 ELSE 3 END"
        }
        SortField::Priority => "CASE priority WHEN 'low' THEN 0 WHEN 'medium' THEN 1 WHEN 'high' THEN 2 ELSE 3 END",
    }
}

fn parse_task_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: parse_id(&row.get::<_, String>(0)?)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: parse_status(&row.get::<_, String>(3)?)?,
        priority: parse_priority(&row.get::<_, String>(4)?)?,
        due_date: row
            .get::<_, Option<String>>(5)?
            .map(|raw| parse_time(&raw))
            .transpose()?,
        completed: row.get(6)?,
        created_at: parse_time(&row.get::<_, String>(7)?)?,
        updated_at: parse_time(&row.get::<_, String>(8)?)?,
    })
}

fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

fn parse_time(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| invalid_column(error.to_string()))
}

fn parse_id(raw: &str) -> rusqlite::Result<TaskId> {
    Uuid::parse_str(raw).map_err(|error| invalid_column(error.to_string()))
}

fn parse_status(raw: &str) -> rusqlite::Result<TaskStatus> {
    TaskStatus::parse(raw).ok_or_else(|| invalid_column(format!("unknown task status `{raw}`")))
}

fn parse_priority(raw: &str) -> rusqlite::Result<TaskPriority> {
    TaskPriority::parse(raw).ok_or_else(|| invalid_column(format!("unknown task priority `{raw}`")))
}

fn invalid_column(message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}
