use anyhow::{anyhow, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use rusqlite::Connection;
use std::io;

use realty_insights::{
    add_user, delete_user, get_user_valuations, home_route, load_catalog, load_user_directory,
    nav_items, save_enrollment, save_valuation, Access, Address, CommercialPropertyInput, Condition,
    Course, CourseCatalog, EnrolledCourse, KeyValueStore, ManagedUser, NewUser, PropertyInput,
    PropertySubtype, PropertyType, ResidentialPropertyInput, Role, Route, RouteGuard,
    SavedValuation, Session, SqliteCredentials, UserDirectory, UserStatus, Valuator,
    DEFAULT_TOTAL_LESSONS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Dashboard,
    MyCourses,
    Valuations,
    Users,
}

impl Page {
    pub const ALL: [Page; 4] = [Page::Dashboard, Page::MyCourses, Page::Valuations, Page::Users];

    pub fn next(&self) -> Self {
        match self {
            Page::Dashboard => Page::MyCourses,
            Page::MyCourses => Page::Valuations,
            Page::Valuations => Page::Users,
            Page::Users => Page::Dashboard,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Dashboard => Page::Users,
            Page::MyCourses => Page::Dashboard,
            Page::Valuations => Page::MyCourses,
            Page::Users => Page::Valuations,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Dashboard => "Dashboard",
            Page::MyCourses => "My Courses",
            Page::Valuations => "Valuations",
            Page::Users => "Users",
        }
    }

    pub fn route(&self, is_admin: bool) -> Route {
        match self {
            Page::Dashboard => home_route(is_admin),
            Page::MyCourses => Route::MyCourses,
            Page::Valuations => Route::Valuation,
            Page::Users => Route::Users,
        }
    }
}

// ============================================================================
// VALUATION FORM
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Address,
    City,
    State,
    ZipCode,
    Bedrooms,
    Bathrooms,
    SquareFeet,
    YearBuilt,
    LotSize,
    Garage,
    Pool,
    Condition,
    Subtype,
    NumFloors,
    ParkingSpaces,
    OccupancyRate,
    AnnualIncome,
    AnnualExpenses,
}

impl FormField {
    const RESIDENTIAL: [FormField; 12] = [
        FormField::Address,
        FormField::City,
        FormField::State,
        FormField::ZipCode,
        FormField::Bedrooms,
        FormField::Bathrooms,
        FormField::SquareFeet,
        FormField::YearBuilt,
        FormField::LotSize,
        FormField::Garage,
        FormField::Pool,
        FormField::Condition,
    ];

    const COMMERCIAL: [FormField; 12] = [
        FormField::Address,
        FormField::City,
        FormField::State,
        FormField::ZipCode,
        FormField::Subtype,
        FormField::SquareFeet,
        FormField::YearBuilt,
        FormField::NumFloors,
        FormField::ParkingSpaces,
        FormField::OccupancyRate,
        FormField::AnnualIncome,
        FormField::AnnualExpenses,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FormField::Address => "Address",
            FormField::City => "City",
            FormField::State => "State",
            FormField::ZipCode => "Zip code",
            FormField::Bedrooms => "Bedrooms (-/+)",
            FormField::Bathrooms => "Bathrooms ([/])",
            FormField::SquareFeet => "Square feet",
            FormField::YearBuilt => "Year built",
            FormField::LotSize => "Lot size (acres)",
            FormField::Garage => "Garage",
            FormField::Pool => "Pool",
            FormField::Condition => "Condition",
            FormField::Subtype => "Property type",
            FormField::NumFloors => "Floors",
            FormField::ParkingSpaces => "Parking spaces",
            FormField::OccupancyRate => "Occupancy (%)",
            FormField::AnnualIncome => "Annual income",
            FormField::AnnualExpenses => "Annual expenses",
        }
    }

    /// Typed fields; the others toggle or cycle on Enter
    pub fn is_text(&self) -> bool {
        !matches!(
            self,
            FormField::Garage | FormField::Pool | FormField::Condition | FormField::Subtype
        )
    }
}

fn parse_number<T: std::str::FromStr>(field: FormField, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| anyhow!("{} must be a number, got '{}'", field.label(), raw))
}

/// Both property forms, the field cursor and the text being typed
pub struct ValuationForm {
    pub kind: PropertyType,
    pub residential: ResidentialPropertyInput,
    pub commercial: CommercialPropertyInput,
    cursor: usize,
    pub editing: Option<String>,
}

impl ValuationForm {
    pub fn new() -> Self {
        ValuationForm {
            kind: PropertyType::Residential,
            residential: ResidentialPropertyInput::default(),
            commercial: CommercialPropertyInput::default(),
            cursor: 0,
            editing: None,
        }
    }

    pub fn fields(&self) -> &'static [FormField] {
        match self.kind {
            PropertyType::Residential => &FormField::RESIDENTIAL,
            PropertyType::Commercial => &FormField::COMMERCIAL,
        }
    }

    pub fn selected(&self) -> FormField {
        self.fields()[self.cursor % self.fields().len()]
    }

    pub fn next_field(&mut self) {
        self.cursor = (self.cursor + 1) % self.fields().len();
    }

    pub fn previous_field(&mut self) {
        let len = self.fields().len();
        self.cursor = (self.cursor + len - 1) % len;
    }

    /// Switch between residential and commercial, carrying the location over
    pub fn toggle_kind(&mut self) {
        let location = self.location().clone();
        self.kind = match self.kind {
            PropertyType::Residential => PropertyType::Commercial,
            PropertyType::Commercial => PropertyType::Residential,
        };
        *self.location_mut() = location;
        self.cursor = 0;
        self.editing = None;
    }

    pub fn location(&self) -> &Address {
        match self.kind {
            PropertyType::Residential => &self.residential.location,
            PropertyType::Commercial => &self.commercial.location,
        }
    }

    fn location_mut(&mut self) -> &mut Address {
        match self.kind {
            PropertyType::Residential => &mut self.residential.location,
            PropertyType::Commercial => &mut self.commercial.location,
        }
    }

    pub fn display(&self, field: FormField) -> String {
        let yes_no = |b: bool| if b { "yes" } else { "no" }.to_string();
        let (r, c) = (&self.residential, &self.commercial);
        let residential = self.kind == PropertyType::Residential;

        match field {
            FormField::Address => self.location().address.clone(),
            FormField::City => self.location().city.clone(),
            FormField::State => self.location().state.clone(),
            FormField::ZipCode => self.location().zip_code.clone(),
            FormField::Bedrooms => r.bedrooms.to_string(),
            FormField::Bathrooms => r.bathrooms.to_string(),
            FormField::SquareFeet if residential => r.square_feet.to_string(),
            FormField::SquareFeet => c.square_feet.to_string(),
            FormField::YearBuilt if residential => r.year_built.to_string(),
            FormField::YearBuilt => c.year_built.to_string(),
            FormField::LotSize => r.lot_size.to_string(),
            FormField::Garage => yes_no(r.has_garage),
            FormField::Pool => yes_no(r.has_pool),
            FormField::Condition => r.condition.as_str().to_string(),
            FormField::Subtype => c.property_subtype.as_str().to_string(),
            FormField::NumFloors => c.num_floors.to_string(),
            FormField::ParkingSpaces => c.parking_spaces.to_string(),
            FormField::OccupancyRate => c.occupancy_rate.to_string(),
            FormField::AnnualIncome => c.annual_income.to_string(),
            FormField::AnnualExpenses => c.annual_expenses.to_string(),
        }
    }

    /// Enter on a field: start typing into text fields, flip or cycle the rest
    pub fn activate(&mut self) {
        let field = self.selected();
        if field.is_text() {
            self.editing = Some(self.display(field));
            return;
        }
        match field {
            FormField::Garage => self.residential.has_garage = !self.residential.has_garage,
            FormField::Pool => self.residential.has_pool = !self.residential.has_pool,
            FormField::Condition => self.cycle_condition(),
            FormField::Subtype => self.cycle_subtype(),
            _ => {}
        }
    }

    pub fn cycle_condition(&mut self) {
        let index = Condition::ALL
            .iter()
            .position(|c| *c == self.residential.condition)
            .unwrap_or(0);
        self.residential.condition = Condition::ALL[(index + 1) % Condition::ALL.len()];
    }

    pub fn cycle_subtype(&mut self) {
        let index = PropertySubtype::ALL
            .iter()
            .position(|t| *t == self.commercial.property_subtype)
            .unwrap_or(0);
        self.commercial.property_subtype = PropertySubtype::ALL[(index + 1) % PropertySubtype::ALL.len()];
    }

    /// Apply the typed text. A value that does not parse keeps the edit open.
    pub fn commit_edit(&mut self) -> Result<()> {
        let Some(raw) = self.editing.clone() else {
            return Ok(());
        };
        self.apply(self.selected(), &raw)?;
        self.editing = None;
        Ok(())
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    fn apply(&mut self, field: FormField, raw: &str) -> Result<()> {
        let residential = self.kind == PropertyType::Residential;
        match field {
            FormField::Address => self.location_mut().address = raw.trim().to_string(),
            FormField::City => self.location_mut().city = raw.trim().to_string(),
            FormField::State => self.location_mut().state = raw.trim().to_string(),
            FormField::ZipCode => self.location_mut().zip_code = raw.trim().to_string(),
            FormField::Bedrooms => self.residential.bedrooms = parse_number(field, raw)?,
            FormField::Bathrooms => self.residential.bathrooms = parse_number(field, raw)?,
            FormField::SquareFeet if residential => self.residential.square_feet = parse_number(field, raw)?,
            FormField::SquareFeet => self.commercial.square_feet = parse_number(field, raw)?,
            FormField::YearBuilt if residential => self.residential.year_built = parse_number(field, raw)?,
            FormField::YearBuilt => self.commercial.year_built = parse_number(field, raw)?,
            FormField::LotSize => self.residential.lot_size = parse_number(field, raw)?,
            FormField::NumFloors => self.commercial.num_floors = parse_number(field, raw)?,
            FormField::ParkingSpaces => self.commercial.parking_spaces = parse_number(field, raw)?,
            FormField::OccupancyRate => self.commercial.occupancy_rate = parse_number(field, raw)?,
            FormField::AnnualIncome => self.commercial.annual_income = parse_number(field, raw)?,
            FormField::AnnualExpenses => self.commercial.annual_expenses = parse_number(field, raw)?,
            FormField::Garage | FormField::Pool | FormField::Condition | FormField::Subtype => {}
        }
        Ok(())
    }

    pub fn input(&self) -> PropertyInput {
        match self.kind {
            PropertyType::Residential => PropertyInput::Residential(self.residential.clone()),
            PropertyType::Commercial => PropertyInput::Commercial(self.commercial.clone()),
        }
    }
}

impl Default for ValuationForm {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// APP STATE
// ============================================================================

pub struct App<'a, S: KeyValueStore> {
    conn: &'a Connection,
    pub session: Session<S, SqliteCredentials<'a>>,
    pub valuator: Valuator,
    pub current_page: Page,
    pub state: TableState,
    pub catalog: CourseCatalog,
    pub valuations: Vec<SavedValuation>,
    pub directory: UserDirectory,
    pub form: ValuationForm,
    pub last_estimate: Option<i64>,
    pub search: String,
    pub searching: bool,
    /// "username email [role]" being typed on the Users page
    pub new_user: Option<String>,
    pub message: Option<String>,
}

impl<'a, S: KeyValueStore> App<'a, S> {
    pub fn new(
        conn: &'a Connection,
        session: Session<S, SqliteCredentials<'a>>,
        valuator: Valuator,
    ) -> Result<Self> {
        let mut app = Self {
            conn,
            session,
            valuator,
            current_page: Page::Dashboard,
            state: TableState::default(),
            catalog: CourseCatalog::empty(),
            valuations: Vec::new(),
            directory: UserDirectory::new(),
            form: ValuationForm::new(),
            last_estimate: None,
            search: String::new(),
            searching: false,
            new_user: None,
            message: None,
        };
        app.reload()?;
        Ok(app)
    }

    /// Refresh the per-user data (and for admins the directory) from the database
    pub fn reload(&mut self) -> Result<()> {
        let Some(user_id) = self.session.current().map(|identity| identity.id) else {
            self.catalog = CourseCatalog::empty();
            self.valuations.clear();
            self.directory = UserDirectory::new();
            return Ok(());
        };

        self.catalog = load_catalog(self.conn, user_id)?;
        self.valuations = get_user_valuations(self.conn, user_id)?;
        self.directory = if self.session.is_admin() {
            load_user_directory(self.conn)?
        } else {
            UserDirectory::new()
        };
        Ok(())
    }

    pub fn access(&self, page: Page) -> Access {
        RouteGuard::check(&self.session.status(), page.route(self.session.is_admin()))
    }

    /// Pages the current session may open
    pub fn allowed_pages(&self) -> Vec<Page> {
        Page::ALL
            .into_iter()
            .filter(|p| self.access(*p) == Access::Allow)
            .collect()
    }

    fn go_to(&mut self, page: Page) {
        self.current_page = page;
        self.search.clear();
        self.searching = false;
        self.new_user = None;
        self.form.cancel_edit();
        self.reset_selection();
    }

    /// Tab order, skipping pages the guard refuses
    pub fn next_page(&mut self) {
        let mut page = self.current_page.next();
        while page != self.current_page && self.access(page) != Access::Allow {
            page = page.next();
        }
        self.go_to(page);
    }

    pub fn previous_page(&mut self) {
        let mut page = self.current_page.previous();
        while page != self.current_page && self.access(page) != Access::Allow {
            page = page.previous();
        }
        self.go_to(page);
    }

    pub fn visible_enrolled(&self) -> Vec<EnrolledCourse> {
        self.catalog.search_enrolled(&self.search)
    }

    pub fn visible_available(&self) -> Vec<Course> {
        self.catalog.search_available(&self.search)
    }

    pub fn visible_users(&self) -> Vec<ManagedUser> {
        self.directory.search(&self.search)
    }

    /// Course rows run through the enrolled table, then the available one
    fn row_count(&self) -> usize {
        match self.current_page {
            Page::Dashboard | Page::Valuations => 0,
            Page::MyCourses => self.visible_enrolled().len() + self.visible_available().len(),
            Page::Users => self.visible_users().len(),
        }
    }

    fn reset_selection(&mut self) {
        if self.row_count() > 0 {
            self.state.select(Some(0));
        } else {
            self.state.select(None);
        }
    }

    pub fn next(&mut self) {
        let len = self.row_count();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.row_count();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn push_search(&mut self, c: char) {
        self.search.push(c);
        self.reset_selection();
    }

    pub fn pop_search(&mut self) {
        self.search.pop();
        self.reset_selection();
    }

    /// Course id under the cursor and whether it is one the user is enrolled in
    fn selected_course(&self) -> Option<(i64, bool)> {
        let index = self.state.selected()?;
        let enrolled = self.visible_enrolled();
        match enrolled.get(index) {
            Some(entry) => Some((entry.course.id, true)),
            None => self
                .visible_available()
                .get(index - enrolled.len())
                .map(|course| (course.id, false)),
        }
    }

    fn store_enrollment(&mut self, course_id: i64) -> Result<()> {
        let Some(user_id) = self.session.current().map(|identity| identity.id) else {
            return Ok(());
        };
        if let Some(enrollment) = self.catalog.enrollment(course_id) {
            save_enrollment(self.conn, user_id, enrollment)?;
        }
        Ok(())
    }

    pub fn enroll_selected(&mut self) -> Result<()> {
        let Some((course_id, false)) = self.selected_course() else {
            return Ok(());
        };
        self.catalog.enroll(course_id, DEFAULT_TOTAL_LESSONS)?;
        self.store_enrollment(course_id)?;
        self.message = Some(format!("Enrolled in course #{}", course_id));
        Ok(())
    }

    pub fn record_selected_lesson(&mut self) -> Result<()> {
        let Some((course_id, true)) = self.selected_course() else {
            return Ok(());
        };
        let progress = self.catalog.record_lesson(course_id)?;
        self.store_enrollment(course_id)?;
        self.message = Some(format!("Course #{} is {}% complete", course_id, progress));
        Ok(())
    }

    /// Value the form and store it for the logged-in user
    pub fn submit_valuation(&mut self) -> Result<i64> {
        let input = self.form.input();
        let result = self.valuator.valuate(&input)?;

        if let Some(identity) = self.session.current() {
            save_valuation(self.conn, identity.id, &input, &result)?;
            self.valuations = get_user_valuations(self.conn, identity.id)?;
        }

        self.last_estimate = Some(result.estimated_value);
        self.message = Some(format!("Estimated value: ${}", result.estimated_value));
        Ok(result.estimated_value)
    }

    /// Create the account typed into the add-user prompt
    pub fn submit_new_user(&mut self) -> Result<()> {
        let Some(line) = self.new_user.take() else {
            return Ok(());
        };
        let mut parts = line.split_whitespace();
        let username = parts.next().unwrap_or_default().to_string();
        let email = parts.next().unwrap_or_default().to_string();
        let role = match parts.next() {
            Some(raw) => raw.parse::<Role>().map_err(|e| anyhow!(e))?,
            None => Role::User,
        };

        let (user, temporary_password) = add_user(self.conn, NewUser { username, email, role })?;
        self.reload()?;
        self.message = Some(format!("Added {} (temporary password {})", user.username, temporary_password));
        Ok(())
    }

    pub fn delete_selected_user(&mut self) -> Result<()> {
        let Some(user) = self.state.selected().and_then(|i| self.visible_users().get(i).cloned()) else {
            return Ok(());
        };
        if self.session.current().map(|me| me.id) == Some(user.id) {
            self.message = Some("You cannot delete your own account".to_string());
            return Ok(());
        }

        delete_user(self.conn, user.id)?;
        self.reload()?;
        self.message = Some(format!("Deleted {}", user.username));
        self.reset_selection();
        Ok(())
    }
}

pub fn run_ui<S: KeyValueStore>(app: &mut App<'_, S>) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend, S: KeyValueStore>(
    terminal: &mut Terminal<B>,
    app: &mut App<'_, S>,
) -> Result<()> {
    app.reset_selection();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let Event::Key(key) = event::read()? else {
            continue;
        };

        if app.searching {
            match key.code {
                KeyCode::Esc | KeyCode::Enter => app.searching = false,
                KeyCode::Backspace => app.pop_search(),
                KeyCode::Char(c) => app.push_search(c),
                _ => {}
            }
            continue;
        }

        let typing = app.new_user.is_some()
            || (app.current_page == Page::Valuations && app.form.editing.is_some());
        if typing {
            let outcome = if app.new_user.is_some() {
                handle_new_user_key(app, key.code)
            } else {
                handle_form_key(app, key.code)
            };
            if let Err(err) = outcome {
                app.message = Some(format!("Error: {}", err));
            }
            continue;
        }

        app.message = None;
        let outcome = match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
            KeyCode::Tab if key.modifiers.contains(KeyModifiers::SHIFT) => {
                app.previous_page();
                Ok(())
            }
            KeyCode::Tab => {
                app.next_page();
                Ok(())
            }
            KeyCode::BackTab => {
                app.previous_page();
                Ok(())
            }
            KeyCode::Char('/') if matches!(app.current_page, Page::MyCourses | Page::Users) => {
                app.searching = true;
                Ok(())
            }
            KeyCode::Char('r') => app.reload(),
            code if app.current_page == Page::Valuations => handle_form_key(app, code),
            KeyCode::Down | KeyCode::Char('j') => {
                app.next();
                Ok(())
            }
            KeyCode::Up | KeyCode::Char('k') => {
                app.previous();
                Ok(())
            }
            KeyCode::Char('e') if app.current_page == Page::MyCourses => app.enroll_selected(),
            KeyCode::Char('l') if app.current_page == Page::MyCourses => app.record_selected_lesson(),
            KeyCode::Char('a') if app.current_page == Page::Users => {
                app.new_user = Some(String::new());
                Ok(())
            }
            KeyCode::Char('d') if app.current_page == Page::Users => app.delete_selected_user(),
            _ => Ok(()),
        };

        if let Err(err) = outcome {
            app.message = Some(format!("Error: {}", err));
        }
    }
}

/// Valuations page: field cursor, text entry and submit
fn handle_form_key<S: KeyValueStore>(app: &mut App<'_, S>, code: KeyCode) -> Result<()> {
    if let Some(buffer) = app.form.editing.as_mut() {
        match code {
            KeyCode::Char(c) => buffer.push(c),
            KeyCode::Backspace => {
                buffer.pop();
            }
            KeyCode::Enter => app.form.commit_edit()?,
            KeyCode::Esc => app.form.cancel_edit(),
            _ => {}
        }
        return Ok(());
    }

    let residential = app.form.kind == PropertyType::Residential;
    match code {
        KeyCode::Down | KeyCode::Char('j') => app.form.next_field(),
        KeyCode::Up | KeyCode::Char('k') => app.form.previous_field(),
        KeyCode::Enter => app.form.activate(),
        KeyCode::Char('m') => app.form.toggle_kind(),
        KeyCode::Char('+') if residential => app.form.residential.increment_bedrooms(),
        KeyCode::Char('-') if residential => app.form.residential.decrement_bedrooms(),
        KeyCode::Char(']') if residential => app.form.residential.increment_bathrooms(),
        KeyCode::Char('[') if residential => app.form.residential.decrement_bathrooms(),
        KeyCode::Char('s') => {
            app.submit_valuation()?;
        }
        _ => {}
    }
    Ok(())
}

/// Users page add prompt: "username email [role]"
fn handle_new_user_key<S: KeyValueStore>(app: &mut App<'_, S>, code: KeyCode) -> Result<()> {
    let Some(buffer) = app.new_user.as_mut() else {
        return Ok(());
    };
    match code {
        KeyCode::Char(c) => buffer.push(c),
        KeyCode::Backspace => {
            buffer.pop();
        }
        KeyCode::Enter => app.submit_new_user()?,
        KeyCode::Esc => app.new_user = None,
        _ => {}
    }
    Ok(())
}

fn ui<S: KeyValueStore>(f: &mut Frame, app: &mut App<'_, S>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.access(app.current_page) {
        Access::Allow => match app.current_page {
            Page::Dashboard => render_dashboard(f, chunks[1], app),
            Page::MyCourses => render_courses(f, chunks[1], app),
            Page::Valuations => render_valuations(f, chunks[1], app),
            Page::Users => render_users(f, chunks[1], app),
        },
        Access::Pending => render_notice(f, chunks[1], "Loading session..."),
        Access::RedirectToLogin { from } => render_notice(
            f,
            chunks[1],
            &format!("Login required for {}. Run: realty-insights login <username> <password>", from),
        ),
        Access::RedirectToDashboard => render_notice(f, chunks[1], "Admin access required"),
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header<S: KeyValueStore>(f: &mut Frame, area: Rect, app: &App<'_, S>) {
    let allowed = app.allowed_pages();

    let mut tab_spans = vec![];
    for (i, page) in allowed.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    let who = match app.session.current() {
        Some(identity) => format!("{} ({})", identity.username, identity.role),
        None => "not logged in".to_string(),
    };
    tab_spans.push(Span::styled(who, Style::default().fg(Color::White)));

    let header = Paragraph::new(vec![Line::from(tab_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Realty Insights "),
    );

    f.render_widget(header, area);
}

fn render_notice(f: &mut Frame, area: Rect, text: &str) {
    let notice = Paragraph::new(vec![Line::from(""), Line::from(format!("  {}", text))]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow)),
    );
    f.render_widget(notice, area);
}

fn label(text: &str) -> Span<'static> {
    Span::styled(
        format!("  {}: ", text),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )
}

fn render_dashboard<S: KeyValueStore>(f: &mut Frame, area: Rect, app: &App<'_, S>) {
    let is_admin = app.session.is_admin();
    let mut content = vec![Line::from("")];

    if is_admin {
        content.push(Line::from(vec![label("Users"), Span::raw(app.directory.count().to_string())]));
        content.push(Line::from(vec![label("Active"), Span::raw(app.directory.active_count().to_string())]));
        content.push(Line::from(vec![
            label("Admins"),
            Span::raw(app.directory.count_by_role(Role::Admin).to_string()),
        ]));
    } else {
        let summary = app.catalog.summary();
        content.push(Line::from(vec![label("Enrolled courses"), Span::raw(summary.enrolled.to_string())]));
        content.push(Line::from(vec![label("Completed"), Span::raw(summary.completed.to_string())]));
        content.push(Line::from(vec![label("In progress"), Span::raw(summary.in_progress.to_string())]));
        content.push(Line::from(vec![
            label("Average progress"),
            Span::raw(format!("{}%", summary.average_progress)),
        ]));
        content.push(Line::from(vec![label("Saved valuations"), Span::raw(app.valuations.len().to_string())]));
        if let Some(latest) = app.valuations.first() {
            content.push(Line::from(vec![
                label("Latest"),
                Span::styled(format!("${}", latest.valuation_amount), Style::default().fg(Color::Green)),
                Span::raw(format!("  {}, {}", latest.address, latest.city)),
            ]));
        }
    }

    content.push(Line::from(""));
    content.push(Line::from("  ─────────────────────────────────────"));
    content.push(Line::from(""));
    for item in nav_items(is_admin) {
        content.push(Line::from(vec![
            Span::styled("  • ", Style::default().fg(Color::Yellow)),
            Span::raw(item.label),
            Span::styled(format!("  {}", item.path), Style::default().fg(Color::DarkGray)),
        ]));
    }

    let title = if is_admin { " Admin Dashboard " } else { " Dashboard " };
    let panel = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(title),
    );
    f.render_widget(panel, area);
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    let cells = titles.iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });
    Row::new(cells).style(Style::default().bg(Color::DarkGray)).height(1)
}

fn render_courses<S: KeyValueStore>(f: &mut Frame, area: Rect, app: &App<'_, S>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let enrolled_rows = app.visible_enrolled();
    let selected = app.state.selected();
    let mut enrolled_state = TableState::default();
    enrolled_state.select(selected.filter(|i| *i < enrolled_rows.len()));
    let mut available_state = TableState::default();
    available_state.select(selected.and_then(|i| i.checked_sub(enrolled_rows.len())));

    let rows: Vec<Row> = enrolled_rows
        .iter()
        .map(|e| {
            let color = if e.progress == 100 { Color::Green } else { Color::White };
            Row::new(vec![
                Cell::from(truncate(&e.course.title, 34)),
                Cell::from(e.course.instructor.clone()),
                Cell::from(e.course.category.clone()),
                Cell::from(format!("{}%", e.progress)).style(Style::default().fg(color)),
                Cell::from(format!("{}/{}", e.completed_lessons, e.total_lessons)),
            ])
        })
        .collect();

    let enrolled = Table::new(
        rows,
        [
            Constraint::Length(36),
            Constraint::Length(20),
            Constraint::Length(14),
            Constraint::Length(9),
            Constraint::Length(9),
        ],
    )
    .header(header_row(&["Course", "Instructor", "Category", "Progress", "Lessons"]))
    .block(Block::default().borders(Borders::ALL).title(" Enrolled "))
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(enrolled, chunks[0], &mut enrolled_state);

    let rows: Vec<Row> = app
        .visible_available()
        .iter()
        .map(|c| {
            Row::new(vec![
                Cell::from(truncate(&c.title, 34)),
                Cell::from(c.instructor.clone()),
                Cell::from(c.level.as_str()),
                Cell::from(format!("{}h", c.duration_hours)),
                Cell::from(format!("${:.2}", c.price)),
            ])
        })
        .collect();

    let available = Table::new(
        rows,
        [
            Constraint::Length(36),
            Constraint::Length(20),
            Constraint::Length(14),
            Constraint::Length(6),
            Constraint::Length(10),
        ],
    )
    .header(header_row(&["Course", "Instructor", "Level", "Hours", "Price"]))
    .block(Block::default().borders(Borders::ALL).title(" Available "))
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(available, chunks[1], &mut available_state);
}

fn render_valuations<S: KeyValueStore>(f: &mut Frame, area: Rect, app: &App<'_, S>) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    let form = &app.form;
    let mut content = vec![Line::from("")];
    for field in form.fields() {
        let selected = *field == form.selected();
        let value = match (&form.editing, selected) {
            (Some(buffer), true) => Span::styled(format!("{}_", buffer), Style::default().fg(Color::Yellow)),
            _ => Span::raw(form.display(*field)),
        };
        let marker = if selected { "→" } else { " " };
        content.push(Line::from(vec![Span::raw(marker), label(field.label()), value]));
    }
    content.push(Line::from(""));
    if let Some(estimate) = app.last_estimate {
        content.push(Line::from(vec![
            label("Estimate"),
            Span::styled(
                format!("${}", estimate),
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            ),
        ]));
    }

    let form_panel = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(match form.kind {
                PropertyType::Residential => " Residential Valuation (m: commercial) ",
                PropertyType::Commercial => " Commercial Valuation (m: residential) ",
            }),
    );
    f.render_widget(form_panel, chunks[0]);

    let rows: Vec<Row> = app
        .valuations
        .iter()
        .map(|v| {
            Row::new(vec![
                Cell::from(v.created_at.get(..10).unwrap_or(&v.created_at).to_string()),
                Cell::from(v.property_type.clone()),
                Cell::from(truncate(&format!("{}, {}", v.address, v.city), 28)),
                Cell::from(format!("${}", v.valuation_amount)).style(Style::default().fg(Color::Green)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(30),
            Constraint::Length(14),
        ],
    )
    .header(header_row(&["Date", "Type", "Property", "Value"]))
    .block(Block::default().borders(Borders::ALL).title(" Saved Valuations "));

    f.render_widget(table, chunks[1]);
}

fn render_users<S: KeyValueStore>(f: &mut Frame, area: Rect, app: &mut App<'_, S>) {
    let rows: Vec<Row> = app
        .visible_users()
        .into_iter()
        .map(|u| {
            let status_color = match u.status {
                UserStatus::Active => Color::Green,
                UserStatus::Inactive => Color::Red,
            };
            Row::new(vec![
                Cell::from(u.id.to_string()),
                Cell::from(u.username),
                Cell::from(u.email),
                Cell::from(u.role.as_str()),
                Cell::from(u.status.as_str()).style(Style::default().fg(status_color)),
                Cell::from(u.courses.to_string()),
                Cell::from(u.joined.to_string()),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Length(12),
            Constraint::Length(24),
            Constraint::Length(7),
            Constraint::Length(9),
            Constraint::Length(8),
            Constraint::Length(12),
        ],
    )
    .header(header_row(&["ID", "Username", "Email", "Role", "Status", "Courses", "Joined"]))
    .block(Block::default().borders(Borders::ALL).title(" User Management "))
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_status_bar<S: KeyValueStore>(f: &mut Frame, area: Rect, app: &App<'_, S>) {
    let mut status_spans = vec![];

    if let Some(message) = &app.message {
        status_spans.push(Span::styled(format!(" {} ", message), Style::default().fg(Color::Green)));
        status_spans.push(Span::raw(" | "));
    }

    if let Some(buffer) = &app.new_user {
        status_spans.push(Span::styled(
            format!("New user (username email [role]): {}_", buffer),
            Style::default().fg(Color::Cyan),
        ));
        status_spans.push(Span::raw(" | "));
    }

    if app.searching || !app.search.is_empty() {
        status_spans.push(Span::styled(
            format!("Search: {}{}", app.search, if app.searching { "_" } else { "" }),
            Style::default().fg(Color::Cyan),
        ));
        status_spans.push(Span::raw(" | "));
    }

    let hint = |key: &'static str, text: &'static str| {
        [Span::styled(key, Style::default().fg(Color::Yellow)), Span::raw(text)]
    };

    status_spans.extend(hint("Tab", " Page | "));
    match app.current_page {
        Page::MyCourses => {
            status_spans.extend(hint("/", " Search | "));
            status_spans.extend(hint("e", " Enroll | "));
            status_spans.extend(hint("l", " Lesson done | "));
        }
        Page::Users => {
            status_spans.extend(hint("/", " Search | "));
            status_spans.extend(hint("a", " Add | "));
            status_spans.extend(hint("d", " Delete | "));
        }
        Page::Valuations => {
            status_spans.extend(hint("Enter", " Edit | "));
            status_spans.extend(hint("m", " Type | "));
            status_spans.extend(hint("s", " Value + save | "));
        }
        Page::Dashboard => {}
    }
    status_spans.extend(hint("↑/↓", " Nav | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use realty_insights::{seed_reference_data, setup_database, MemoryStore};

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        seed_reference_data(&conn).unwrap();
        conn
    }

    fn app_for<'a>(conn: &'a Connection, login: Option<(&str, &str)>) -> App<'a, MemoryStore> {
        let mut session = Session::open(MemoryStore::new(), SqliteCredentials::new(conn), "user");
        if let Some((u, p)) = login {
            session.login(u, p).unwrap();
        }
        App::new(conn, session, Valuator::default()).unwrap()
    }

    #[test]
    fn test_user_tabs_skip_users_page() {
        let conn = test_db();
        let mut app = app_for(&conn, Some(("muser", "muser")));

        assert_eq!(app.allowed_pages(), vec![Page::Dashboard, Page::MyCourses, Page::Valuations]);
        app.next_page();
        app.next_page();
        assert_eq!(app.current_page, Page::Valuations);
        app.next_page();
        assert_eq!(app.current_page, Page::Dashboard);
        app.previous_page();
        assert_eq!(app.current_page, Page::Valuations);
    }

    #[test]
    fn test_admin_sees_all_pages() {
        let conn = test_db();
        let app = app_for(&conn, Some(("mvc", "mvc")));
        assert_eq!(app.allowed_pages(), Page::ALL.to_vec());
        assert_eq!(Page::Dashboard.route(true), Route::AdminDashboard);
    }

    #[test]
    fn test_logged_out_redirects() {
        let conn = test_db();
        let app = app_for(&conn, None);
        assert!(app.allowed_pages().is_empty());
        assert!(matches!(app.access(Page::MyCourses), Access::RedirectToLogin { .. }));
        assert!(app.catalog.enrolled().is_empty());
    }

    #[test]
    fn test_course_search() {
        let conn = test_db();
        let mut app = app_for(&conn, Some(("muser", "muser")));
        assert_eq!(app.visible_enrolled().len(), 3);
        assert_eq!(app.visible_available().len(), 4);

        for c in "finance".chars() {
            app.push_search(c);
        }
        assert!(app.visible_enrolled().is_empty());
        assert_eq!(app.visible_available().len(), 1);
    }

    fn press<S: KeyValueStore>(app: &mut App<'_, S>, keys: &[KeyCode]) {
        for key in keys {
            handle_form_key(app, *key).unwrap();
        }
    }

    /// Open the selected field, replace its text, commit, then move down
    fn fill<S: KeyValueStore>(app: &mut App<'_, S>, text: &str) {
        handle_form_key(app, KeyCode::Enter).unwrap();
        while app.form.editing.as_deref().is_some_and(|b| !b.is_empty()) {
            handle_form_key(app, KeyCode::Backspace).unwrap();
        }
        for c in text.chars() {
            handle_form_key(app, KeyCode::Char(c)).unwrap();
        }
        handle_form_key(app, KeyCode::Enter).unwrap();
        handle_form_key(app, KeyCode::Down).unwrap();
    }

    #[test]
    fn test_form_keys_fill_location_and_save() {
        let conn = test_db();
        let mut app = app_for(&conn, Some(("muser", "muser")));
        app.current_page = Page::Valuations;

        // Nothing typed yet
        assert!(handle_form_key(&mut app, KeyCode::Char('s')).is_err());
        assert!(app.valuations.is_empty());

        fill(&mut app, "1 Elm St");
        fill(&mut app, "Springfield");
        fill(&mut app, "IL");
        fill(&mut app, "62701");
        press(&mut app, &[KeyCode::Char('s')]);

        assert_eq!(app.last_estimate, Some(407_500));
        assert_eq!(app.valuations.len(), 1);
        assert_eq!(app.valuations[0].address, "1 Elm St");
        assert_eq!(app.valuations[0].zip_code, "62701");

        // Bedrooms, Bathrooms, then Square feet
        assert_eq!(app.form.selected(), FormField::Bedrooms);
        press(&mut app, &[KeyCode::Down, KeyCode::Down]);
        fill(&mut app, "2000");
        press(&mut app, &[KeyCode::Char('s')]);
        assert_eq!(app.valuations[0].valuation_amount, 507_500);
        assert_eq!(app.valuations[0].square_feet, 2000.0);
    }

    #[test]
    fn test_form_keys_reach_commercial_model() {
        let conn = test_db();
        let mut app = app_for(&conn, Some(("muser", "muser")));

        fill(&mut app, "500 W 2nd St");
        fill(&mut app, "Austin");
        fill(&mut app, "TX");
        fill(&mut app, "78701");
        press(&mut app, &[KeyCode::Char('m')]);

        assert_eq!(app.form.kind, PropertyType::Commercial);
        assert_eq!(app.form.location().city, "Austin");
        assert_eq!(app.form.selected(), FormField::Address);

        press(&mut app, &[KeyCode::Char('s')]);
        assert_eq!(app.valuations[0].property_type, "commercial");
        assert_eq!(app.valuations[0].valuation_amount, 1_597_500);

        // Subtype cycles on Enter
        press(&mut app, &[KeyCode::Up; 8]);
        assert_eq!(app.form.selected(), FormField::Subtype);
        press(&mut app, &[KeyCode::Enter]);
        assert_ne!(app.form.commercial.property_subtype, PropertySubtype::Office);
        assert!(app.form.editing.is_none());
    }

    #[test]
    fn test_form_rejects_bad_number_until_fixed() {
        let conn = test_db();
        let mut app = app_for(&conn, Some(("muser", "muser")));

        press(&mut app, &[KeyCode::Down; 4]);
        assert_eq!(app.form.selected(), FormField::Bedrooms);
        press(&mut app, &[KeyCode::Enter, KeyCode::Backspace, KeyCode::Char('x')]);
        assert!(handle_form_key(&mut app, KeyCode::Enter).is_err());
        assert_eq!(app.form.editing.as_deref(), Some("x"));

        press(&mut app, &[KeyCode::Backspace, KeyCode::Char('5'), KeyCode::Enter]);
        assert_eq!(app.form.residential.bedrooms, 5);

        press(&mut app, &[KeyCode::Enter, KeyCode::Char('9'), KeyCode::Esc]);
        assert_eq!(app.form.residential.bedrooms, 5);
        assert!(app.form.editing.is_none());

        press(&mut app, &[KeyCode::Char('-')]);
        assert_eq!(app.form.residential.bedrooms, 4);
    }

    #[test]
    fn test_cycle_condition_wraps() {
        let mut form = ValuationForm::new();
        let start = form.residential.condition;
        for _ in 0..Condition::ALL.len() {
            form.cycle_condition();
        }
        assert_eq!(form.residential.condition, start);
    }

    #[test]
    fn test_enroll_and_record_lesson_persist() {
        let conn = test_db();
        let mut app = app_for(&conn, Some(("muser", "muser")));
        app.current_page = Page::MyCourses;
        app.reset_selection();

        // First enrolled row: lesson done
        app.record_selected_lesson().unwrap();
        // First available row sits after the three enrolled ones
        app.state.select(Some(3));
        app.enroll_selected().unwrap();

        let stored = load_catalog(&conn, 1).unwrap();
        assert_eq!(stored.enrolled().len(), 4);
        assert_eq!(stored.summary(), app.catalog.summary());
        assert_eq!(app.visible_available().len(), 3);

        // Enroll does nothing on an enrolled row
        app.state.select(Some(0));
        app.enroll_selected().unwrap();
        assert_eq!(app.catalog.enrolled().len(), 4);
    }

    #[test]
    fn test_delete_selected_user_protects_self() {
        let conn = test_db();
        let mut app = app_for(&conn, Some(("mvc", "mvc")));
        app.current_page = Page::Users;
        assert_eq!(app.directory.count(), 2);

        // mvc is row 2
        app.state.select(Some(1));
        app.delete_selected_user().unwrap();
        assert_eq!(app.directory.count(), 2);

        app.state.select(Some(0));
        app.delete_selected_user().unwrap();
        assert_eq!(app.directory.count(), 1);
        assert_eq!(load_user_directory(&conn).unwrap().count(), 1);
    }

    #[test]
    fn test_add_user_prompt() {
        let conn = test_db();
        let mut app = app_for(&conn, Some(("mvc", "mvc")));
        app.current_page = Page::Users;

        app.new_user = Some(String::new());
        for c in "dana dana@example.com admin".chars() {
            handle_new_user_key(&mut app, KeyCode::Char(c)).unwrap();
        }
        handle_new_user_key(&mut app, KeyCode::Enter).unwrap();

        assert!(app.new_user.is_none());
        assert_eq!(app.directory.count(), 3);
        assert_eq!(app.directory.count_by_role(Role::Admin), 2);
        assert!(app.message.as_deref().unwrap().starts_with("Added dana"));

        app.new_user = Some("erin".to_string());
        assert!(handle_new_user_key(&mut app, KeyCode::Enter).is_err());
        assert_eq!(app.directory.count(), 3);
    }

    #[test]
    fn test_users_page_empty_for_non_admin() {
        let conn = test_db();
        let app = app_for(&conn, Some(("muser", "muser")));
        assert_eq!(app.directory.count(), 0);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a much longer title", 10), "a much ...");
    }
}
