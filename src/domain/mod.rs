pub mod artist;
pub mod track;
