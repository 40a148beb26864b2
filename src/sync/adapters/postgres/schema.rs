//! Diesel schema for task/issue mappings.

diesel::table! {
    /// One row per linked task.
    task_issue_mappings (task_id) {
        /// Board task identifier.
        task_id -> Int8,
        /// Owning team.
        team_id -> Int8,
        /// GitHub issue number, unique within the team.
        issue_number -> Int8,
        /// Browser URL of the issue.
        issue_url -> Text,
        /// Sync status in its canonical upper-case form.
        #[max_length = 16]
        sync_status -> Varchar,
        /// Content fingerprint recorded at the last successful sync.
        #[max_length = 64]
        synced_fingerprint -> Nullable<Varchar>,
        /// Time of the last successful sync.
        last_synced_at -> Nullable<Timestamptz>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}
