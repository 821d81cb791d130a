use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "studio", about = concat!("studio v", env!("CARGO_PKG_VERSION"), " - production tracking for creative studios"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different studio directory
    #[arg(short = 'C', long = "studio-dir", global = true)]
    pub studio_dir: Option<String>,

    /// Act as this user instead of the session user
    #[arg(long = "as", value_name = "USER", global = true)]
    pub actor: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new studio in the current directory
    Init(InitArgs),
    /// List service orders
    Orders(FilterArgs),
    /// Show order details
    Show(OrderArg),
    /// Create a service order
    Add(AddArgs),
    /// Move an order to another workflow stage
    Status(StatusArgs),
    /// Set order fields (key=value)
    Set(SetArgs),
    /// Comment on an order
    Comment(CommentArgs),
    /// Permanently delete an order (admin only)
    Delete(OrderArg),
    /// Show the Kanban board
    Board(FilterArgs),
    /// Show orders on a day grid
    Timeline(FilterArgs),
    /// Show the activity log
    Log(LogArgs),
    /// Look up an order by its shareable link
    Portal(PortalArgs),
    /// Create (or show) an order's shareable link
    Share(OrderArg),
    /// Commercial quotes
    Quote(QuoteCmd),
    /// Sales opportunities
    Opportunity(OpportunityCmd),
    /// Financial entries and summary
    Finance(FinanceCmd),
    /// Team chat
    Chat(ChatCmd),
    /// Staff and roles
    Users(UsersCmd),
    /// Workflow columns
    Column(ColumnCmd),
    /// Saved board views
    View(ViewCmd),
    /// Edit an order interactively with auto-save
    Edit(OrderArg),
    /// Show the progress percentage of every stage
    Progress,
}

// ---------------------------------------------------------------------------
// Init args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct InitArgs {
    /// Studio name (default: inferred from directory name)
    #[arg(long)]
    pub name: Option<String>,
    /// Id of the first admin user
    #[arg(long, default_value = "admin")]
    pub admin: String,
    /// Display name of the first admin user
    #[arg(long, default_value = "Administrator")]
    pub admin_name: String,
}

// ---------------------------------------------------------------------------
// Order args
// ---------------------------------------------------------------------------

#[derive(Args, Clone, Default)]
pub struct FilterArgs {
    /// Match client, order number or status (case-insensitive)
    #[arg(long, short)]
    pub search: Option<String>,
    /// Only orders assigned to this user
    #[arg(long)]
    pub responsible: Option<String>,
    /// Created on or after (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<String>,
    /// Created on or before (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<String>,
    /// Start from a saved view; other flags narrow it further
    #[arg(long)]
    pub view: Option<String>,
}

#[derive(Args)]
pub struct OrderArg {
    /// Order number (OS-001) or id
    pub order: String,
}

#[derive(Args)]
pub struct AddArgs {
    /// Client name
    pub client: String,
    /// What is being produced
    pub title: String,
    /// Order value
    #[arg(long, default_value_t = 0.0)]
    pub value: f64,
    /// Production costs
    #[arg(long, default_value_t = 0.0)]
    pub costs: f64,
    /// Responsible user id
    #[arg(long)]
    pub responsible: Option<String>,
    /// Expected delivery date (YYYY-MM-DD)
    #[arg(long)]
    pub due: Option<String>,
    /// Initial stage (default: first column)
    #[arg(long)]
    pub status: Option<String>,
}

#[derive(Args)]
pub struct StatusArgs {
    /// Order number or id
    pub order: String,
    /// Target stage
    pub status: String,
}

#[derive(Args)]
pub struct SetArgs {
    /// Order number or id
    pub order: String,
    /// Assignments: client=, title=, value=, costs=, responsible=, due=,
    /// task=+Title, done=N, file=name|url, custom.<key>=
    #[arg(required = true, value_name = "KEY=VALUE")]
    pub fields: Vec<String>,
}

#[derive(Args)]
pub struct CommentArgs {
    /// Order number or id
    pub order: String,
    /// Comment text
    pub text: String,
}

#[derive(Args)]
pub struct LogArgs {
    /// Only entries by this user
    #[arg(long)]
    pub user: Option<String>,
    /// Maximum entries to show
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(Args)]
pub struct PortalArgs {
    /// Token or /portal/<token> link
    pub link: String,
}

// ---------------------------------------------------------------------------
// Sales
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct QuoteCmd {
    #[command(subcommand)]
    pub action: QuoteAction,
}

#[derive(Subcommand)]
pub enum QuoteAction {
    /// Create a draft quote
    Add(QuoteAddArgs),
    /// List quotes
    List,
    /// Set quote status (draft, sent, approved, rejected)
    Status(SalesStatusArgs),
    /// Create a service order from a quote
    Convert(IdArg),
}

#[derive(Args)]
pub struct QuoteAddArgs {
    pub client: String,
    pub description: String,
    /// Line item as description:quantity:unit_price (repeatable)
    #[arg(long = "item", value_name = "ITEM")]
    pub items: Vec<String>,
}

#[derive(Args)]
pub struct SalesStatusArgs {
    pub id: String,
    pub status: String,
}

#[derive(Args)]
pub struct IdArg {
    pub id: String,
}

#[derive(Args)]
pub struct OpportunityCmd {
    #[command(subcommand)]
    pub action: OpportunityAction,
}

#[derive(Subcommand)]
pub enum OpportunityAction {
    /// Record a new lead
    Add(OpportunityAddArgs),
    /// List opportunities
    List,
    /// Set status (lead, qualified, proposal, negotiation, won, lost)
    Status(SalesStatusArgs),
    /// Create a service order from an opportunity
    Convert(IdArg),
}

#[derive(Args)]
pub struct OpportunityAddArgs {
    pub client: String,
    pub title: String,
    /// Estimated value
    #[arg(long, default_value_t = 0.0)]
    pub value: f64,
}

// ---------------------------------------------------------------------------
// Finance
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct FinanceCmd {
    #[command(subcommand)]
    pub action: FinanceAction,
}

#[derive(Subcommand)]
pub enum FinanceAction {
    /// Record income or an expense
    Add(FinanceAddArgs),
    /// Totals and monthly breakdown
    Summary,
}

#[derive(Args)]
pub struct FinanceAddArgs {
    /// income or expense
    pub kind: String,
    pub amount: f64,
    pub description: String,
    /// Entry date (YYYY-MM-DD, default today)
    #[arg(long)]
    pub date: Option<String>,
    /// Related order number or id
    #[arg(long)]
    pub order: Option<String>,
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ChatCmd {
    #[command(subcommand)]
    pub action: ChatAction,
}

#[derive(Subcommand)]
pub enum ChatAction {
    /// Create a channel
    Channel(ChannelArgs),
    /// List channels
    Channels,
    /// Post a message (@name mentions notify)
    Post(ChatPostArgs),
    /// Show the newest messages of a channel
    List(ChatListArgs),
    /// Toggle a reaction on a message
    React(ChatReactArgs),
}

#[derive(Args)]
pub struct ChannelArgs {
    pub name: String,
}

#[derive(Args)]
pub struct ChatPostArgs {
    /// Channel name or id
    pub channel: String,
    pub text: String,
}

#[derive(Args)]
pub struct ChatListArgs {
    /// Channel name or id
    pub channel: String,
    /// Extra pages of older messages to load
    #[arg(long, default_value_t = 0)]
    pub more: usize,
}

#[derive(Args)]
pub struct ChatReactArgs {
    /// Message id (or unique prefix)
    pub message: String,
    pub emoji: String,
}

// ---------------------------------------------------------------------------
// Users, columns, views
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct UsersCmd {
    #[command(subcommand)]
    pub action: UsersAction,
}

#[derive(Subcommand)]
pub enum UsersAction {
    /// Add a user (admin only)
    Add(UserAddArgs),
    /// List users
    List,
    /// Set the session user in studio.toml
    Use(IdArg),
}

#[derive(Args)]
pub struct UserAddArgs {
    pub id: String,
    pub name: String,
    /// admin, assistant or viewer
    #[arg(long, default_value = "assistant")]
    pub role: String,
}

#[derive(Args)]
pub struct ColumnCmd {
    #[command(subcommand)]
    pub action: ColumnAction,
}

#[derive(Subcommand)]
pub enum ColumnAction {
    /// Add a stage before the terminal column
    Add(ColumnAddArgs),
}

#[derive(Args)]
pub struct ColumnAddArgs {
    /// Display title
    pub title: String,
    /// Status name stored on orders
    pub status: String,
    /// Hex color
    #[arg(long, default_value = "#888888")]
    pub color: String,
}

#[derive(Args)]
pub struct ViewCmd {
    #[command(subcommand)]
    pub action: ViewAction,
}

#[derive(Subcommand)]
pub enum ViewAction {
    /// Save the given filters under a name
    Save(ViewSaveArgs),
    /// List saved views
    List,
}

#[derive(Args)]
pub struct ViewSaveArgs {
    pub name: String,
    #[command(flatten)]
    pub filter: FilterArgs,
}
