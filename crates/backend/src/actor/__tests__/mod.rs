mod concurrency;
mod helpers;
mod session;
