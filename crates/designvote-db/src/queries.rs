use rusqlite::{Connection, Row, params};

use crate::error::{Result, StoreError};
use crate::models::{CommentRow, DesignRow, Page, PageRequest, UserRow};

/// Handle to an open transaction. Only obtainable through
/// [`Database::unit_of_work`](crate::Database::unit_of_work), which owns the
/// commit/rollback decision.
pub struct UnitOfWork<'a> {
    conn: &'a Connection,
}

const COMMENT_COLUMNS: &str = "id, design_id, user_id, parent_id, body, likes, created_at";

impl<'a> UnitOfWork<'a> {
    pub(crate) fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    // -- Users --

    pub fn insert_user(&self, user: &UserRow) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO users (id, username, password, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![user.id, user.username, user.password, user.created_at],
            )
            .map_err(|e| StoreError::conflict_on_constraint(e, "username"))?;
        Ok(())
    }

    pub fn get_user(&self, id: &str) -> Result<Option<UserRow>> {
        self.conn
            .query_row(
                "SELECT id, username, password, created_at FROM users WHERE id = ?1",
                [id],
                user_from_row,
            )
            .optional()
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.conn
            .query_row(
                "SELECT id, username, password, created_at FROM users WHERE username = ?1",
                [username],
                user_from_row,
            )
            .optional()
    }

    // -- Designs --

    pub fn insert_design(&self, design: &DesignRow) -> Result<()> {
        self.conn.execute(
            "INSERT INTO designs (id, image_url, votes, contact, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![design.id, design.image_url, design.votes, design.contact, design.created_at],
        )?;
        Ok(())
    }

    pub fn get_design(&self, id: &str) -> Result<Option<DesignRow>> {
        self.conn
            .query_row(
                "SELECT id, image_url, votes, contact, created_at FROM designs WHERE id = ?1",
                [id],
                design_from_row,
            )
            .optional()
    }

    pub fn list_designs(&self) -> Result<Vec<DesignRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, image_url, votes, contact, created_at FROM designs ORDER BY created_at, rowid",
        )?;
        let rows = stmt
            .query_map([], design_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Add exactly one vote and return the new total. A single UPDATE, so
    /// concurrent voters cannot lose increments.
    pub fn increment_votes(&self, design_id: &str) -> Result<i64> {
        self.conn
            .query_row(
                "UPDATE designs SET votes = votes + 1 WHERE id = ?1 RETURNING votes",
                [design_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StoreError::NotFound("design"))
    }

    // -- Comments --

    /// Insert a comment. Replies must point at a top-level comment of the
    /// same design; threads are one level deep.
    pub fn insert_comment(&self, comment: &CommentRow) -> Result<()> {
        if self.get_design(&comment.design_id)?.is_none() {
            return Err(StoreError::NotFound("design"));
        }

        if let Some(parent_id) = &comment.parent_id {
            let parent = self.get_comment(parent_id)?.ok_or(StoreError::NotFound("comment"))?;
            if parent.design_id != comment.design_id {
                return Err(StoreError::Invalid("reply must belong to the parent's design".into()));
            }
            if parent.is_reply() {
                return Err(StoreError::Invalid("replies cannot be nested".into()));
            }
        }

        self.conn.execute(
            "INSERT INTO comments (id, design_id, user_id, parent_id, body, likes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                comment.id,
                comment.design_id,
                comment.user_id,
                comment.parent_id,
                comment.body,
                comment.likes,
                comment.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_comment(&self, id: &str) -> Result<Option<CommentRow>> {
        self.conn
            .query_row(
                &format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?1"),
                [id],
                comment_from_row,
            )
            .optional()
    }

    /// Top-level comments of a design, newest first.
    pub fn get_comments(&self, design_id: &str, page: PageRequest) -> Result<Page<CommentRow>> {
        self.paginate_comments("design_id = ?1 AND parent_id IS NULL", design_id, page)
    }

    /// Replies to a comment, newest first.
    pub fn get_paginated_replies(&self, comment_id: &str, page: PageRequest) -> Result<Page<CommentRow>> {
        self.paginate_comments("parent_id = ?1", comment_id, page)
    }

    fn paginate_comments(&self, filter: &str, key: &str, page: PageRequest) -> Result<Page<CommentRow>> {
        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM comments WHERE {filter}"),
            [key],
            |row| row.get(0),
        )?;
        let total = total as u64;

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments
             WHERE {filter}
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2 OFFSET ?3"
        ))?;
        let items = stmt
            .query_map(
                params![key, i64::from(page.page_size), page.offset() as i64],
                comment_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            total,
            page: page.page,
            page_size: page.page_size,
            has_more: page.has_more(total),
        })
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn design_from_row(row: &Row<'_>) -> rusqlite::Result<DesignRow> {
    Ok(DesignRow {
        id: row.get(0)?,
        image_url: row.get(1)?,
        votes: row.get(2)?,
        contact: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        design_id: row.get(1)?,
        user_id: row.get(2)?,
        parent_id: row.get(3)?,
        body: row.get(4)?,
        likes: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
