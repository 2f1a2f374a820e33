use rocket::Route;

mod admin;
mod auth;
mod common;
mod nomination;
mod public;
mod voting;
mod withdrawal;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(auth::routes());
    routes.extend(nomination::routes());
    routes.extend(public::routes());
    routes.extend(voting::routes());
    routes.extend(withdrawal::routes());
    routes
}
