//! SQLite database holding matches and the snapshot archive.

npscan_core::define_database!(
    MatchDatabase,
    "./migrations/matches",
    "Match database migrations complete"
);
