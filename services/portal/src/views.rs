//! HTML rendering for the portal
//!
//! Server-rendered forms, tables, and navigation. All state changes go
//! through POST + redirect, so every function here only builds markup.

use crate::database;
use crate::models::{Role, User};
use crate::session::{Flash, FlashKind, SessionUser};

/// Escape user-provided text for embedding in HTML
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn flash_class(kind: FlashKind) -> &'static str {
    match kind {
        FlashKind::Success => "flash success",
        FlashKind::Error => "flash error",
        FlashKind::Info => "flash info",
    }
}

fn render_flashes(flashes: &[Flash]) -> String {
    flashes
        .iter()
        .map(|f| {
            format!(
                "<div class=\"{}\">{}</div>\n",
                flash_class(f.kind),
                escape(&f.message)
            )
        })
        .collect()
}

fn nav(user: Option<&SessionUser>) -> String {
    let Some(user) = user else {
        return String::new();
    };

    let dashboard = match user.role {
        Role::Admin => "<a href=\"/admin\">Admin Dashboard</a>",
        Role::Student => "<a href=\"/student\">Student Dashboard</a>",
    };

    format!(
        concat!(
            "<nav>\n",
            "<a href=\"/\">Home</a>\n",
            "{dashboard}\n",
            "<a href=\"/profile\">Profile</a>\n",
            "<a href=\"/password\">Change Password</a>\n",
            "<span class=\"whoami\">{username} ({role})</span>\n",
            "<form method=\"post\" action=\"/logout\"><button type=\"submit\">Logout</button></form>\n",
            "</nav>\n"
        ),
        dashboard = dashboard,
        username = escape(&user.username),
        role = user.role.title(),
    )
}

fn layout(title: &str, user: Option<&SessionUser>, flashes: &[Flash], body: &str) -> String {
    format!(
        concat!(
            "<!DOCTYPE html>\n",
            "<html lang=\"en\">\n",
            "<head>\n",
            "<meta charset=\"utf-8\">\n",
            "<title>{title} - Coplur Portal</title>\n",
            "<style>\n",
            "body {{ font-family: sans-serif; max-width: 60rem; margin: 2rem auto; }}\n",
            "nav a, nav form {{ margin-right: 1rem; display: inline-block; }}\n",
            ".flash.success {{ color: #155724; background: #d4edda; padding: .5rem; }}\n",
            ".flash.error {{ color: #721c24; background: #f8d7da; padding: .5rem; }}\n",
            ".flash.info {{ color: #0c5460; background: #d1ecf1; padding: .5rem; }}\n",
            ".warning {{ color: #856404; background: #fff3cd; padding: .5rem; }}\n",
            "table {{ border-collapse: collapse; width: 100%; }}\n",
            "td, th {{ border: 1px solid #ccc; padding: .4rem; text-align: left; }}\n",
            "label {{ display: block; margin-top: .5rem; }}\n",
            "</style>\n",
            "</head>\n",
            "<body>\n",
            "<h1>Coplur Portal</h1>\n",
            "{nav}",
            "{flashes}",
            "{body}",
            "</body>\n",
            "</html>\n"
        ),
        title = escape(title),
        nav = nav(user),
        flashes = render_flashes(flashes),
        body = body,
    )
}

/// Public landing page: demo credentials plus login and registration forms
pub fn public_page(flashes: &[Flash]) -> String {
    let body = format!(
        concat!(
            "<section class=\"demo\">\n",
            "<h2>Demo Credentials</h2>\n",
            "<p>Demo account for exploring the application:</p>\n",
            "<pre>Username: {admin_user}\nPassword: {admin_pass}</pre>\n",
            "<p class=\"warning\">These are demo credentials for testing purposes only.</p>\n",
            "</section>\n",
            "<section>\n",
            "<h2>Login</h2>\n",
            "<form method=\"post\" action=\"/login\">\n",
            "<label>Username <input type=\"text\" name=\"username\"></label>\n",
            "<label>Password <input type=\"password\" name=\"password\"></label>\n",
            "<button type=\"submit\">Login</button>\n",
            "</form>\n",
            "</section>\n",
            "<section>\n",
            "<h2>Student Registration</h2>\n",
            "<form method=\"post\" action=\"/register\">\n",
            "<label>Username <input type=\"text\" name=\"username\"></label>\n",
            "<label>Email <input type=\"text\" name=\"email\"></label>\n",
            "<label>Password <input type=\"password\" name=\"password\"></label>\n",
            "<label>Confirm Password <input type=\"password\" name=\"confirm_password\"></label>\n",
            "<button type=\"submit\">Register</button>\n",
            "</form>\n",
            "</section>\n"
        ),
        admin_user = database::DEFAULT_ADMIN_USERNAME,
        admin_pass = database::DEFAULT_ADMIN_PASSWORD,
    );

    layout("Welcome", None, flashes, &body)
}

/// Home page for an authenticated user
pub fn home_page(user: &SessionUser, flashes: &[Flash]) -> String {
    let dashboard = match user.role {
        Role::Admin => "<p><a href=\"/admin\">Go to Admin Dashboard</a></p>\n",
        Role::Student => "<p><a href=\"/student\">Go to Student Dashboard</a></p>\n",
    };

    let body = format!(
        concat!(
            "<p>Welcome back, {username}! You are logged in as: <strong>{role}</strong></p>\n",
            "{dashboard}",
            "<p><a href=\"/profile\">View Profile</a></p>\n",
            "<p><a href=\"/password\">Change Password</a></p>\n"
        ),
        username = escape(&user.username),
        role = user.role.title(),
        dashboard = dashboard,
    );

    layout("Home", Some(user), flashes, &body)
}

/// Profile page for the current user
pub fn profile_page(user: &SessionUser, flashes: &[Flash]) -> String {
    let body = format!(
        concat!(
            "<h2>Profile Information</h2>\n",
            "<p><strong>Username:</strong> {username}</p>\n",
            "<p><strong>Email:</strong> {email}</p>\n",
            "<p><strong>Role:</strong> {role}</p>\n",
            "<p><strong>User ID:</strong> {id}</p>\n",
            "<p><a href=\"/\">Back to Home</a></p>\n"
        ),
        username = escape(&user.username),
        email = escape(&user.email),
        role = user.role.title(),
        id = user.id,
    );

    layout("Profile", Some(user), flashes, &body)
}

/// Password change form
pub fn password_page(user: &SessionUser, flashes: &[Flash]) -> String {
    let body = concat!(
        "<h2>Change Password</h2>\n",
        "<form method=\"post\" action=\"/password\">\n",
        "<label>Current Password <input type=\"password\" name=\"current_password\"></label>\n",
        "<label>New Password <input type=\"password\" name=\"new_password\"></label>\n",
        "<label>Confirm New Password <input type=\"password\" name=\"confirm_password\"></label>\n",
        "<button type=\"submit\">Change Password</button>\n",
        "</form>\n",
        "<p><a href=\"/\">Back to Home</a></p>\n"
    );

    layout("Change Password", Some(user), flashes, body)
}

/// Student dashboard
pub fn student_page(user: &SessionUser, flashes: &[Flash]) -> String {
    let body = format!(
        concat!(
            "<h2>Student Dashboard</h2>\n",
            "<p>Welcome, {username}! This is your student portal.</p>\n",
            "<p><a href=\"/password\">Change Password</a></p>\n",
            "<p><a href=\"/\">Back to Home</a></p>\n"
        ),
        username = escape(&user.username),
    );

    layout("Student Dashboard", Some(user), flashes, &body)
}

fn user_row(current: &SessionUser, user: &User) -> String {
    // Self-deletion is blocked here in the presentation layer, not the store
    let delete = if user.id == current.id {
        "<em>current user</em>".to_string()
    } else {
        format!(
            concat!(
                "<form method=\"post\" action=\"/admin/users/{id}/delete\">",
                "<button type=\"submit\">Delete</button></form>"
            ),
            id = user.id
        )
    };

    format!(
        concat!(
            "<tr><td>{id}</td><td>{username}</td><td>{email}</td><td>{role}</td>",
            "<td>{created_at}</td>",
            "<td><a href=\"/admin/users/{id}/edit\">Edit</a> {delete}</td></tr>\n"
        ),
        id = user.id,
        username = escape(&user.username),
        email = escape(&user.email),
        role = user.role.title(),
        created_at = user.created_at.format("%Y-%m-%d %H:%M"),
        delete = delete,
    )
}

/// Admin dashboard: stats, user table, create form
pub fn admin_page(current: &SessionUser, users: &[User], flashes: &[Flash]) -> String {
    let total = users.len();
    let admins = users.iter().filter(|u| u.role == Role::Admin).count();
    let students = users.iter().filter(|u| u.role == Role::Student).count();

    let rows: String = users.iter().map(|u| user_row(current, u)).collect();

    let body = format!(
        concat!(
            "<h2>Admin Dashboard</h2>\n",
            "<p>Total Users: <strong>{total}</strong> | ",
            "Administrators: <strong>{admins}</strong> | ",
            "Students: <strong>{students}</strong></p>\n",
            "<h3>Users</h3>\n",
            "<table>\n",
            "<tr><th>ID</th><th>Username</th><th>Email</th><th>Role</th>",
            "<th>Created</th><th>Actions</th></tr>\n",
            "{rows}",
            "</table>\n",
            "<h3>Create New User</h3>\n",
            "<p>Password must be at least 8 characters with at least one letter and one number.</p>\n",
            "<form method=\"post\" action=\"/admin/users\">\n",
            "<label>Username <input type=\"text\" name=\"username\"></label>\n",
            "<label>Email <input type=\"text\" name=\"email\"></label>\n",
            "<label>Password <input type=\"password\" name=\"password\"></label>\n",
            "<label>Role <select name=\"role\">",
            "<option value=\"student\">student</option>",
            "<option value=\"admin\">admin</option>",
            "</select></label>\n",
            "<button type=\"submit\">Create User</button>\n",
            "</form>\n"
        ),
        total = total,
        admins = admins,
        students = students,
        rows = rows,
    );

    layout("Admin Dashboard", Some(current), flashes, &body)
}

/// Admin edit form for a single user
pub fn edit_user_page(
    current: &SessionUser,
    target: &User,
    is_last_admin: bool,
    flashes: &[Flash],
) -> String {
    let warning = if is_last_admin {
        "<p class=\"warning\">This is the last admin user. \
         Role cannot be changed to prevent system lockout.</p>\n"
    } else {
        ""
    };

    let role_field = if is_last_admin {
        "<label>Role <select name=\"role\"><option value=\"admin\">admin</option></select></label>\n"
            .to_string()
    } else {
        let (admin_sel, student_sel) = match target.role {
            Role::Admin => (" selected", ""),
            Role::Student => ("", " selected"),
        };
        format!(
            concat!(
                "<label>Role <select name=\"role\">",
                "<option value=\"student\"{student_sel}>student</option>",
                "<option value=\"admin\"{admin_sel}>admin</option>",
                "</select></label>\n"
            ),
            student_sel = student_sel,
            admin_sel = admin_sel,
        )
    };

    let body = format!(
        concat!(
            "<h2>Edit User: {target_name}</h2>\n",
            "{warning}",
            "<form method=\"post\" action=\"/admin/users/{id}\">\n",
            "<label>Username <input type=\"text\" name=\"username\" value=\"{username}\"></label>\n",
            "<label>Email <input type=\"text\" name=\"email\" value=\"{email}\"></label>\n",
            "{role_field}",
            "<button type=\"submit\">Save Changes</button>\n",
            "</form>\n",
            "<p><a href=\"/admin\">Back to Admin Dashboard</a></p>\n"
        ),
        target_name = escape(&target.username),
        warning = warning,
        id = target.id,
        username = escape(&target.username),
        email = escape(&target.email),
        role_field = role_field,
    );

    layout("Edit User", Some(current), flashes, &body)
}

/// Standalone error page used by `PortalError` responses
pub fn error_page(message: &str, offer_logout: bool) -> String {
    let logout = if offer_logout {
        "<form method=\"post\" action=\"/logout\"><button type=\"submit\">Logout and Refresh</button></form>\n"
    } else {
        ""
    };

    let body = format!(
        concat!(
            "<div class=\"flash error\">{message}</div>\n",
            "<p><a href=\"/\">Back to Home</a></p>\n",
            "{logout}"
        ),
        message = escape(message),
        logout = logout,
    );

    layout("Error", None, &[], &body)
}
