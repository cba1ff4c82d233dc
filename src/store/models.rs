//! Row types returned by [`super::UserStore`].

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: i32,
    pub username: String,
    pub username_safe: String,
    pub password_md5: String,
    pub privileges: i64,
    pub silence_end: i64,
    pub donor_expire: i64,
    pub frozen: bool,
    pub freezedate: i64,
    pub first_login_after_frozen: bool,
    pub country: String,
    pub osuver: String,
}

#[derive(Debug, Clone)]
pub struct ChannelRecord {
    pub name: String,
    pub description: String,
    pub public_read: bool,
    pub public_write: bool,
}
