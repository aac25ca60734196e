//! Shell script rendering
//!
//! Static scripts embed the encoded [`CompletionTable`] and walk it in the
//! shell itself. Dynamic scripts hand the command line back to the program
//! through the hidden completion flag and only interpret the answer.

use crate::complete::{CompletionTable, COMPLETE_FLAG};
use crate::tree::CommandTree;
use crate::utils::shell_quote;
use clap::ValueEnum;
use std::fmt;
use std::str::FromStr;

/// Target shell for completion scripts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum ShellDialect {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell", alias = "pwsh")]
    PowerShell,
}

impl ShellDialect {
    pub fn name(self) -> &'static str {
        match self {
            ShellDialect::Bash => "bash",
            ShellDialect::Zsh => "zsh",
            ShellDialect::Fish => "fish",
            ShellDialect::PowerShell => "powershell",
        }
    }

    /// Whether the shell can show a description next to each candidate
    pub fn shows_descriptions(self) -> bool {
        !matches!(self, ShellDialect::Bash)
    }
}

impl fmt::Display for ShellDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ShellDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bash" => Ok(ShellDialect::Bash),
            "zsh" => Ok(ShellDialect::Zsh),
            "fish" => Ok(ShellDialect::Fish),
            "powershell" | "pwsh" => Ok(ShellDialect::PowerShell),
            other => Err(format!("unsupported shell: {}", other)),
        }
    }
}

impl From<ShellDialect> for clap_complete::Shell {
    fn from(dialect: ShellDialect) -> Self {
        match dialect {
            ShellDialect::Bash => clap_complete::Shell::Bash,
            ShellDialect::Zsh => clap_complete::Shell::Zsh,
            ShellDialect::Fish => clap_complete::Shell::Fish,
            ShellDialect::PowerShell => clap_complete::Shell::PowerShell,
        }
    }
}

/// How a script obtains its candidates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScriptMode {
    /// Self-contained; never runs the program
    #[default]
    Static,
    /// Calls `<program> --__complete <line> <cursor> <shell>` per keystroke
    Dynamic,
}

/// Static completion script for `tree`
pub fn generate_completion_script(tree: &CommandTree, dialect: ShellDialect) -> String {
    generate_script(tree, dialect, ScriptMode::Static)
}

pub fn generate_script(tree: &CommandTree, dialect: ShellDialect, mode: ScriptMode) -> String {
    match mode {
        ScriptMode::Static => render_static(&CompletionTable::new(tree), dialect),
        ScriptMode::Dynamic => render_dynamic(tree.program_name(), dialect),
    }
}

/// Render a static script around an already built table
pub fn render_static(table: &CompletionTable, dialect: ShellDialect) -> String {
    let encoded = table.encode();
    let template = match dialect {
        ShellDialect::Bash => [BASH_STATIC_HEADER, POSIX_WALK, BASH_REPLY, BASH_STATIC_MAIN].concat(),
        ShellDialect::Zsh => [ZSH_STATIC_HEADER, POSIX_WALK, ZSH_STATIC_MAIN].concat(),
        ShellDialect::Fish => FISH_STATIC.to_string(),
        ShellDialect::PowerShell => [POWERSHELL_STATIC, POWERSHELL_EMIT].concat(),
    };
    let table_text = match dialect {
        ShellDialect::Bash | ShellDialect::Zsh => shell_quote(&encoded),
        ShellDialect::Fish => fish_quote(&encoded),
        ShellDialect::PowerShell => encoded,
    };
    fill(&template, &table.program).replace("{{table}}", &table_text)
}

/// Render a script that asks the program for candidates
pub fn render_dynamic(program: &str, dialect: ShellDialect) -> String {
    let template = match dialect {
        ShellDialect::Bash => [BASH_DYNAMIC_HEADER, BASH_REPLY, BASH_DYNAMIC_MAIN].concat(),
        ShellDialect::Zsh => ZSH_DYNAMIC.to_string(),
        ShellDialect::Fish => FISH_DYNAMIC.to_string(),
        ShellDialect::PowerShell => [POWERSHELL_DYNAMIC, POWERSHELL_EMIT].concat(),
    };
    fill(&template, program)
}

fn fill(template: &str, program: &str) -> String {
    template
        .replace("{{fn}}", &function_prefix(program))
        .replace("{{prog}}", program)
        .replace("{{flag}}", COMPLETE_FLAG)
        .replace("{{ps_prog}}", &program.replace('\'', "''"))
}

/// Shell function prefix for a program, e.g. `__my_tool`
fn function_prefix(program: &str) -> String {
    let body: String = program
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("__{}", body)
}

fn fish_quote(text: &str) -> String {
    format!("'{}'", text.replace('\\', "\\\\").replace('\'', "\\'"))
}

const BASH_STATIC_HEADER: &str = r#"# bash completion for {{prog}}
#
# Source this file, or copy it into your bash-completion directory.
# Every command, flag and value is listed in the table below; the script
# never runs {{prog}}.
"#;

const ZSH_STATIC_HEADER: &str = r#"#compdef {{prog}}
#
# zsh completion for {{prog}}
#
# Place this file in a directory on your $fpath as _{{prog}}.
"#;

// Table walk shared by bash and zsh. Kept to the syntax both shells accept:
// no array indexing, no read -a.
const POSIX_WALK: &str = r#"
{{fn}}_table={{table}}

{{fn}}_find_flag() {
    # $1 state, $2 long name or empty, $3 shorthand or empty
    local k s name short attrs
    while IFS=$'\t' read -r k s name short attrs; do
        [[ $k == f && $s == "$1" ]] || continue
        if [[ -n $2 && $name == "$2" ]] || [[ -n $3 && $short == "$3" ]]; then
            {{fn}}_flag=$name
            {{fn}}_attrs=$attrs
            return 0
        fi
    done <<< "${{fn}}_table"
    return 1
}

{{fn}}_child() {
    # $1 state, $2 word
    local k s word target offered
    while IFS=$'\t' read -r k s word target offered; do
        if [[ $k == c && $s == "$1" && $word == "$2" ]]; then
            {{fn}}_state=$target
            return 0
        fi
    done <<< "${{fn}}_table"
    return 1
}

{{fn}}_values() {
    # $1 flag, $2 text put before each value, $3 typed prefix
    local k s name x found=0 dirs=0
    local -a exts
    exts=()
    while IFS=$'\t' read -r k s name x; do
        [[ $s == "${{fn}}_state" && $name == "$1" ]] || continue
        case $k in
            v)
                found=1
                [[ $x == "$3"* ]] && {{fn}}_out+=("$2$x")
                ;;
            x) exts+=("$x") ;;
            d) dirs=1 ;;
        esac
    done <<< "${{fn}}_table"
    if (( found )); then
        {{fn}}_directive=4
    elif (( ${#exts[@]} )); then
        {{fn}}_out=("${exts[@]}")
        {{fn}}_directive=8
    elif (( dirs )); then
        {{fn}}_directive=16
    else
        {{fn}}_directive=0
    fi
}

{{fn}}_walk() {
    # $@ completed words after the program name
    {{fn}}_state=0
    {{fn}}_mode=path
    {{fn}}_pending=
    {{fn}}_used=" "
    local word name chars i
    for word in "$@"; do
        if [[ -n ${{fn}}_pending ]]; then
            {{fn}}_pending=
            continue
        fi
        [[ ${{fn}}_mode == sep ]] && continue
        case $word in
            --)
                {{fn}}_mode=sep
                ;;
            --*)
                name=${word#--}
                name=${name%%=*}
                if [[ -z $name || $name == -* || $name == *--* ]]; then
                    {{fn}}_mode=args
                elif {{fn}}_find_flag "${{fn}}_state" "$name" ""; then
                    {{fn}}_used+="${{fn}}_flag "
                    if [[ ${{fn}}_attrs == *v* && $word != *=* ]]; then
                        {{fn}}_pending=${{fn}}_flag
                    fi
                elif [[ $name == no-* ]] && {{fn}}_find_flag "${{fn}}_state" "${name#no-}" ""; then
                    [[ ${{fn}}_attrs == *b* ]] && {{fn}}_used+="${{fn}}_flag "
                fi
                ;;
            -[A-Za-z]*)
                chars=${word#-}
                chars=${chars%%=*}
                for (( i = 0; i < ${#chars}; i++ )); do
                    {{fn}}_find_flag "${{fn}}_state" "" "${chars:$i:1}" || break
                    {{fn}}_used+="${{fn}}_flag "
                    if [[ ${{fn}}_attrs == *v* ]]; then
                        if (( i + 1 == ${#chars} )) && [[ $word != *=* ]]; then
                            {{fn}}_pending=${{fn}}_flag
                        fi
                        break
                    fi
                done
                ;;
            *)
                if [[ ${{fn}}_mode == path ]] && {{fn}}_child "${{fn}}_state" "$word"; then
                    continue
                fi
                {{fn}}_mode=args
                ;;
        esac
    done
}

{{fn}}_candidates() {
    # $1 the word under the cursor; fills {{fn}}_out and {{fn}}_directive
    local cur=$1 k s name short attrs offered children=0
    {{fn}}_out=()
    {{fn}}_directive=4
    if [[ -n ${{fn}}_pending ]]; then
        {{fn}}_values "${{fn}}_pending" "" "$cur"
        return
    fi
    if [[ ${{fn}}_mode == sep ]]; then
        {{fn}}_directive=0
        return
    fi
    if [[ $cur == --*=* ]]; then
        name=${cur#--}
        name=${name%%=*}
        if {{fn}}_find_flag "${{fn}}_state" "$name" "" && [[ ${{fn}}_attrs == *v* ]]; then
            {{fn}}_values "$name" "--$name=" "${cur#*=}"
        fi
        return
    fi
    if [[ $cur == -* ]]; then
        while IFS=$'\t' read -r k s name short attrs; do
            [[ $k == f && $s == "${{fn}}_state" ]] || continue
            [[ $attrs == *h* ]] && continue
            [[ $attrs != *r* && ${{fn}}_used == *" $name "* ]] && continue
            [[ "--$name" == "$cur"* ]] && {{fn}}_out+=("--$name")
            if [[ $short != - && $cur != --* && "-$short" == "$cur"* ]]; then
                {{fn}}_out+=("-$short")
            fi
        done <<< "${{fn}}_table"
        return
    fi
    while IFS=$'\t' read -r k s name short offered; do
        [[ $s == "${{fn}}_state" ]] || continue
        if [[ $k == c ]]; then
            children=1
            if [[ ${{fn}}_mode == path && $offered == 1 && $name == "$cur"* ]]; then
                {{fn}}_out+=("$name")
            fi
        elif [[ $k == a && $name == "$cur"* ]]; then
            {{fn}}_out+=("$name")
        fi
    done <<< "${{fn}}_table"
    if (( ${#{{fn}}_out[@]} == 0 )) && ! [[ ${{fn}}_mode == path && $children == 1 ]]; then
        {{fn}}_directive=0
    fi
}
"#;

const BASH_REPLY: &str = r#"
{{fn}}_reply() {
    # turn {{fn}}_out and {{fn}}_directive into COMPREPLY for the word $1
    local cur=$1 pattern
    case ${{fn}}_directive in
        16)
            COMPREPLY=($(compgen -d -- "$cur"))
            ;;
        8)
            pattern=$(IFS='|'; echo "${{{fn}}_out[*]}")
            if declare -F _filedir >/dev/null; then
                _filedir "@($pattern)"
            else
                COMPREPLY=($(compgen -f -- "$cur"))
            fi
            ;;
        0)
            COMPREPLY=($(compgen -f -- "$cur"))
            ;;
        *)
            COMPREPLY=("${{{fn}}_out[@]}")
            # bash splits --flag=value at '=' and completes only the value
            if [[ $cur == *=* && $COMP_WORDBREAKS == *=* ]]; then
                COMPREPLY=("${COMPREPLY[@]#*=}")
            fi
            ;;
    esac
}
"#;

const BASH_STATIC_MAIN: &str = r#"
{{fn}}_complete() {
    local line=${COMP_LINE:0:COMP_POINT}
    local -a words
    read -r -a words <<< "$line"
    local cur=
    if [[ $line != *[[:space:]] && ${#words[@]} -gt 1 ]]; then
        cur=${words[${#words[@]}-1]}
        unset 'words[${#words[@]}-1]'
    fi
    {{fn}}_walk "${words[@]:1}"
    {{fn}}_candidates "$cur"
    {{fn}}_reply "$cur"
}

complete -F {{fn}}_complete {{prog}}
"#;

const ZSH_STATIC_MAIN: &str = r#"
{{fn}}_complete() {
    local cur=${words[CURRENT]}
    {{fn}}_walk "${(@)words[2,CURRENT-1]}"
    {{fn}}_candidates "$cur"
    case ${{fn}}_directive in
        16) _path_files -/ ;;
        8) _files -g "*.(${(j:|:){{fn}}_out})" ;;
        0) _files ;;
        *) compadd -Q -a {{fn}}_out ;;
    esac
}

compdef {{fn}}_complete {{prog}}
"#;

const BASH_DYNAMIC_HEADER: &str = r#"# bash completion for {{prog}}
#
# Candidates come from `{{prog}} {{flag}} <line> <cursor> bash`.
"#;

const BASH_DYNAMIC_MAIN: &str = r#"
{{fn}}_complete() {
    local line=${COMP_LINE:0:COMP_POINT}
    local -a words
    read -r -a words <<< "$line"
    local cur= out entry
    if [[ $line != *[[:space:]] && ${#words[@]} -gt 1 ]]; then
        cur=${words[${#words[@]}-1]}
    fi
    out=$({{prog}} {{flag}} "$line" "${#line}" bash 2>/dev/null) || return
    {{fn}}_out=()
    {{fn}}_directive=0
    while IFS= read -r entry; do
        case $entry in
            :*) {{fn}}_directive=${entry#:} ;;
            '') ;;
            *) {{fn}}_out+=("$entry") ;;
        esac
    done <<< "$out"
    {{fn}}_reply "$cur"
}

complete -F {{fn}}_complete {{prog}}
"#;

const ZSH_DYNAMIC: &str = r#"#compdef {{prog}}
#
# zsh completion for {{prog}}
#
# Candidates come from `{{prog}} {{flag}} <line> <cursor> zsh`.

{{fn}}_complete() {
    local line="${(j: :)words[1,CURRENT]}"
    local out entry directive=0
    local -a candidates described
    out=$({{prog}} {{flag}} "$line" "${#line}" zsh 2>/dev/null) || return
    for entry in "${(@f)out}"; do
        case $entry in
            :*) directive=${entry#:} ;;
            '') ;;
            *)
                candidates+=("${entry%%$'\t'*}")
                if [[ $entry == *$'\t'* ]]; then
                    described+=("${${entry%%$'\t'*}//:/\\:}:${entry#*$'\t'}")
                else
                    described+=("${entry//:/\\:}")
                fi
                ;;
        esac
    done
    case $directive in
        16) _path_files -/ ;;
        8) _files -g "*.(${(j:|:)candidates})" ;;
        0) _files ;;
        *) _describe -t values '{{prog}}' described ;;
    esac
}

compdef {{fn}}_complete {{prog}}
"#;

const FISH_STATIC: &str = r#"# fish completion for {{prog}}
#
# Every command, flag and value is listed in the table below; the script
# never runs {{prog}}.

set -g {{fn}}_table {{table}}

function {{fn}}_flag --argument-names state long short
    for line in (string split -n \n -- ${{fn}}_table)
        set -l f (string split \t -- $line)
        test "$f[1]" = f -a "$f[2]" = "$state"; or continue
        if test -n "$long" -a "$f[3]" = "$long"; or test -n "$short" -a "$f[4]" = "$short"
            printf '%s\t%s\n' $f[3] $f[5]
            return 0
        end
    end
    return 1
end

function {{fn}}_child --argument-names state word
    for line in (string split -n \n -- ${{fn}}_table)
        set -l f (string split \t -- $line)
        if test "$f[1]" = c -a "$f[2]" = "$state" -a "$f[3]" = "$word"
            echo $f[4]
            return 0
        end
    end
    return 1
end

function {{fn}}_values --argument-names state name lead prefix
    set -l values
    set -l exts
    set -l dirs 0
    for line in (string split -n \n -- ${{fn}}_table)
        set -l f (string split \t -- $line)
        test "$f[2]" = "$state" -a "$f[3]" = "$name"; or continue
        switch $f[1]
            case v
                set -a values $f[4]
            case x
                set -a exts $f[4]
            case d
                set dirs 1
        end
    end
    if test (count $values) -gt 0
        for v in $values
            string match -q -- "$prefix*" $v; and printf '%s\n' "$lead$v"
        end
    else if test (count $exts) -gt 0
        for p in (__fish_complete_path $prefix)
            if test -d $p; or string match -q -r -- '\.('(string join '|' -- $exts)')$' $p
                printf '%s\n' $p
            end
        end
    else if test $dirs -eq 1
        __fish_complete_directories $prefix
    else
        __fish_complete_path $prefix
    end
end

function {{fn}}_complete
    set -l words (commandline -opc)
    set -e words[1]
    set -l cur (commandline -ct)
    set -l state 0
    set -l mode path
    set -l pending
    set -l used
    for word in $words
        if test -n "$pending"
            set pending
            continue
        end
        test $mode = sep; and continue
        if test "$word" = --
            set mode sep
        else if string match -q -r -- '^--(?!-)(?:(?!--)[^=])+(=|$)' $word
            set -l name (string replace -r '^--([^=]*).*$' '$1' -- $word)
            set -l flag ({{fn}}_flag $state $name '' | string split \t)
            if test (count $flag) -eq 2
                set -a used $flag[1]
                if string match -q '*v*' -- $flag[2]; and not string match -q '*=*' -- $word
                    set pending $flag[1]
                end
            else if string match -q 'no-*' -- $name
                set flag ({{fn}}_flag $state (string sub -s 4 -- $name) '' | string split \t)
                if test (count $flag) -eq 2; and string match -q '*b*' -- $flag[2]
                    set -a used $flag[1]
                end
            end
        else if string match -q -r -- '^-[A-Za-z]' $word
            set -l chars (string replace -r '^-([^=]*).*$' '$1' -- $word)
            set -l n (string length -- $chars)
            for i in (seq $n)
                set -l flag ({{fn}}_flag $state '' (string sub -s $i -l 1 -- $chars) | string split \t)
                test (count $flag) -eq 2; or break
                set -a used $flag[1]
                if string match -q '*v*' -- $flag[2]
                    if test $i -eq $n; and not string match -q '*=*' -- $word
                        set pending $flag[1]
                    end
                    break
                end
            end
        else
            set -l target
            test $mode = path; and set target ({{fn}}_child $state $word)
            if test -n "$target"
                set state $target
            else
                set mode args
            end
        end
    end

    if test -n "$pending"
        {{fn}}_values $state $pending '' $cur
        return
    end
    if test $mode = sep
        __fish_complete_path $cur
        return
    end
    if string match -q -- '--*=*' $cur
        set -l name (string replace -r '^--([^=]*)=.*$' '$1' -- $cur)
        set -l flag ({{fn}}_flag $state $name '' | string split \t)
        if test (count $flag) -eq 2; and string match -q '*v*' -- $flag[2]
            {{fn}}_values $state $name "--$name=" (string replace -r '^[^=]*=' '' -- $cur)
        end
        return
    end

    set -l out
    set -l children 0
    for line in (string split -n \n -- ${{fn}}_table)
        set -l f (string split \t -- $line)
        test "$f[2]" = "$state"; or continue
        if string match -q -- '-*' $cur
            test "$f[1]" = f; or continue
            string match -q '*h*' -- $f[5]; and continue
            if not string match -q '*r*' -- $f[5]; and contains -- $f[3] $used
                continue
            end
            string match -q -- "$cur*" "--$f[3]"; and set -a out "--$f[3]"
            if test "$f[4]" != - ; and not string match -q -- '--*' $cur; and string match -q -- "$cur*" "-$f[4]"
                set -a out "-$f[4]"
            end
        else if test "$f[1]" = c
            set children 1
            if test $mode = path -a "$f[5]" = 1; and string match -q -- "$cur*" $f[3]
                set -a out $f[3]
            end
        else if test "$f[1]" = a; and string match -q -- "$cur*" $f[3]
            set -a out $f[3]
        end
    end
    if test (count $out) -eq 0; and not string match -q -- '-*' $cur
        if test $mode != path -o $children -eq 0
            __fish_complete_path $cur
            return
        end
    end
    printf '%s\n' $out
end

complete -c {{prog}} -f -a '({{fn}}_complete)'
"#;

const FISH_DYNAMIC: &str = r#"# fish completion for {{prog}}
#
# Candidates come from `{{prog}} {{flag}} <line> <cursor> fish`.

function {{fn}}_complete
    set -l line (commandline -cp)
    set -l out ({{prog}} {{flag}} "$line" (string length -- "$line") fish 2>/dev/null)
    or return
    set -l directive 0
    set -l candidates
    for entry in $out
        if string match -q -- ':*' $entry
            set directive (string sub -s 2 -- $entry)
        else if test -n "$entry"
            set -a candidates $entry
        end
    end
    set -l cur (commandline -ct)
    switch $directive
        case 16
            __fish_complete_directories $cur
        case 8
            for p in (__fish_complete_path $cur)
                if test -d $p; or string match -q -r -- '\.('(string join '|' -- $candidates)')$' $p
                    printf '%s\n' $p
                end
            end
        case 0
            __fish_complete_path $cur
        case '*'
            printf '%s\n' $candidates
    end
end

complete -c {{prog}} -f -a '({{fn}}_complete)'
"#;

const POWERSHELL_STATIC: &str = r#"# powershell completion for {{prog}}
#
# Add this to your profile. Every command, flag and value is listed in the
# table below; the completer never runs {{prog}}.

Register-ArgumentCompleter -Native -CommandName '{{ps_prog}}' -ScriptBlock {
    param($wordToComplete, $commandAst, $cursorPosition)

    $table = @'
{{table}}'@
    $records = @($table -split "`n" | Where-Object { $_ } | ForEach-Object { ,($_ -split "`t") })

    function Find-Flag($state, $long, $short) {
        foreach ($r in $records) {
            if ($r[0] -cne 'f' -or $r[1] -cne $state) { continue }
            if (($long -and $r[2] -ceq $long) -or ($short -and $r[3] -ceq $short)) { return ,$r }
        }
        return $null
    }

    function Get-Values($state, $name, $lead, $prefix) {
        $values = @(); $exts = @(); $dirs = $false
        foreach ($r in $records) {
            if ($r[1] -cne $state -or $r[2] -cne $name) { continue }
            switch -CaseSensitive ($r[0]) {
                'v' { $values += $r[3] }
                'x' { $exts += $r[3] }
                'd' { $dirs = $true }
            }
        }
        if ($values.Count) {
            return @{ Out = @($values | Where-Object { $_.StartsWith($prefix) } | ForEach-Object { "$lead$_" }); Directive = 4 }
        }
        if ($exts.Count) { return @{ Out = $exts; Directive = 8 } }
        if ($dirs) { return @{ Out = @(); Directive = 16 } }
        return @{ Out = @(); Directive = 0 }
    }

    $cur = [string]$wordToComplete
    $text = $commandAst.Extent.Text
    $line = $text.Substring(0, [Math]::Min($cursorPosition - $commandAst.Extent.StartOffset, $text.Length))
    $words = @($line -split '\s+' | Where-Object { $_ } | Select-Object -Skip 1)
    if ($cur -and $words.Count) { $words = @($words | Select-Object -SkipLast 1) }

    $state = '0'; $mode = 'path'; $pending = $null; $used = @()
    foreach ($word in $words) {
        if ($pending) { $pending = $null; continue }
        if ($mode -eq 'sep') { continue }
        if ($word -ceq '--') {
            $mode = 'sep'
        } elseif ($word -cmatch '^--(?!-)(?:(?!--)[^=])+(=|$)') {
            $name = ($word.Substring(2) -split '=', 2)[0]
            $flag = Find-Flag $state $name $null
            if ($flag) {
                $used += $flag[2]
                if ($flag[4].Contains('v') -and -not $word.Contains('=')) { $pending = $flag[2] }
            } elseif ($name.StartsWith('no-')) {
                $flag = Find-Flag $state $name.Substring(3) $null
                if ($flag -and $flag[4].Contains('b')) { $used += $flag[2] }
            }
        } elseif ($word -cmatch '^-[A-Za-z]') {
            $chars = ($word.Substring(1) -split '=', 2)[0]
            for ($i = 0; $i -lt $chars.Length; $i++) {
                $flag = Find-Flag $state $null ([string]$chars[$i])
                if (-not $flag) { break }
                $used += $flag[2]
                if ($flag[4].Contains('v')) {
                    if ($i -eq $chars.Length - 1 -and -not $word.Contains('=')) { $pending = $flag[2] }
                    break
                }
            }
        } else {
            $target = $null
            if ($mode -eq 'path') {
                foreach ($r in $records) {
                    if ($r[0] -ceq 'c' -and $r[1] -ceq $state -and $r[2] -ceq $word) { $target = $r[3]; break }
                }
            }
            if ($null -ne $target) { $state = $target } else { $mode = 'args' }
        }
    }

    $out = @(); $directive = 4; $descriptions = @{}
    if ($pending) {
        $result = Get-Values $state $pending '' $cur
        $out = $result.Out; $directive = $result.Directive
    } elseif ($mode -eq 'sep') {
        $directive = 0
    } elseif ($cur -cmatch '^--([^=]*)=(.*)$') {
        $name = $Matches[1]; $prefix = $Matches[2]
        $flag = Find-Flag $state $name $null
        if ($flag -and $flag[4].Contains('v')) {
            $result = Get-Values $state $name "--$name=" $prefix
            $out = $result.Out; $directive = $result.Directive
        }
    } elseif ($cur.StartsWith('-')) {
        foreach ($r in $records) {
            if ($r[0] -cne 'f' -or $r[1] -cne $state -or $r[4].Contains('h')) { continue }
            if (-not $r[4].Contains('r') -and $used -ccontains $r[2]) { continue }
            if ("--$($r[2])".StartsWith($cur)) { $out += "--$($r[2])" }
            if ($r[3] -cne '-' -and -not $cur.StartsWith('--') -and "-$($r[3])".StartsWith($cur)) { $out += "-$($r[3])" }
        }
    } else {
        $children = $false
        foreach ($r in $records) {
            if ($r[1] -cne $state) { continue }
            if ($r[0] -ceq 'c') {
                $children = $true
                if ($mode -eq 'path' -and $r[4] -ceq '1' -and $r[2].StartsWith($cur)) { $out += $r[2] }
            } elseif ($r[0] -ceq 'a' -and $r[2].StartsWith($cur) -and $out -cnotcontains $r[2]) {
                $out += $r[2]
            }
        }
        if (-not $out.Count -and -not ($mode -eq 'path' -and $children)) { $directive = 0 }
    }
"#;

const POWERSHELL_DYNAMIC: &str = r#"# powershell completion for {{prog}}
#
# Candidates come from `{{prog}} {{flag}} <line> <cursor> powershell`.

Register-ArgumentCompleter -Native -CommandName '{{ps_prog}}' -ScriptBlock {
    param($wordToComplete, $commandAst, $cursorPosition)

    $cur = [string]$wordToComplete
    $text = $commandAst.Extent.Text
    $line = $text.Substring(0, [Math]::Min($cursorPosition - $commandAst.Extent.StartOffset, $text.Length))
    if ($cursorPosition -gt $commandAst.Extent.EndOffset) { $line += ' ' }

    $out = @(); $directive = 0; $descriptions = @{}
    foreach ($entry in @(& '{{ps_prog}}' '{{flag}}' $line $line.Length 'powershell' 2>$null)) {
        if ($entry.StartsWith(':')) {
            $directive = [int]$entry.Substring(1)
        } elseif ($entry) {
            $candidate, $about = $entry -split "`t", 2
            $out += $candidate
            if ($about) { $descriptions[$candidate] = $about }
        }
    }
"#;

// Shared tail of both PowerShell completers: turn $out and $directive into
// completion results.
const POWERSHELL_EMIT: &str = r#"
    $parent = Split-Path -Parent $cur
    switch ($directive) {
        16 {
            Get-ChildItem -Directory -Path "$cur*" -ErrorAction SilentlyContinue | ForEach-Object {
                $path = if ($parent) { Join-Path $parent $_.Name } else { $_.Name }
                [System.Management.Automation.CompletionResult]::new($path, $_.Name, 'ProviderContainer', $_.Name)
            }
        }
        8 {
            Get-ChildItem -Path "$cur*" -ErrorAction SilentlyContinue |
                Where-Object { $_.PSIsContainer -or $out -contains $_.Extension.TrimStart('.') } |
                ForEach-Object {
                    $path = if ($parent) { Join-Path $parent $_.Name } else { $_.Name }
                    [System.Management.Automation.CompletionResult]::new($path, $_.Name, 'ProviderItem', $_.Name)
                }
        }
        0 { }
        default {
            $out | ForEach-Object {
                $tip = if ($descriptions.ContainsKey($_)) { $descriptions[$_] } else { $_ }
                [System.Management.Automation.CompletionResult]::new($_, $_, 'ParameterValue', $tip)
            }
        }
    }
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flag::FlagSpec;
    use crate::tree::Command;

    fn tree() -> CommandTree {
        CommandTree::new(
            Command::new("my-tool")
                .flag(FlagSpec::string("color").values(["auto", "never"]).persistent())
                .subcommand(Command::new("build")),
        )
        .unwrap()
    }

    #[test]
    fn test_dialect_names_round_trip() {
        for dialect in ShellDialect::value_variants() {
            assert_eq!(dialect.name().parse::<ShellDialect>(), Ok(*dialect));
        }
        assert_eq!("pwsh".parse::<ShellDialect>(), Ok(ShellDialect::PowerShell));
        assert!("tcsh".parse::<ShellDialect>().is_err());
    }

    #[test]
    fn test_static_scripts_embed_table_and_register() {
        let tree = tree();
        let bash = generate_completion_script(&tree, ShellDialect::Bash);
        assert!(bash.contains("complete -F __my_tool_complete my-tool"));
        assert!(bash.contains("v\t0\tcolor\tnever"));
        assert!(!bash.contains("{{"));

        let zsh = generate_completion_script(&tree, ShellDialect::Zsh);
        assert!(zsh.starts_with("#compdef my-tool"));
        assert!(zsh.contains("compdef __my_tool_complete my-tool"));

        let fish = generate_completion_script(&tree, ShellDialect::Fish);
        assert!(fish.contains("complete -c my-tool -f -a '(__my_tool_complete)'"));
        assert!(fish.contains("c\t0\tbuild\t1\t1"));

        let ps = generate_completion_script(&tree, ShellDialect::PowerShell);
        assert!(ps.contains("-CommandName 'my-tool'"));
        assert!(ps.contains("v\t1\tcolor\tnever\n'@"));
    }

    #[test]
    fn test_static_scripts_do_not_call_the_program() {
        let tree = tree();
        for dialect in ShellDialect::value_variants() {
            let script = generate_completion_script(&tree, *dialect);
            assert!(!script.contains(COMPLETE_FLAG), "{} script calls back", dialect);
        }
    }

    #[test]
    fn test_dynamic_scripts_call_back() {
        let tree = tree();
        for dialect in ShellDialect::value_variants() {
            let script = generate_script(&tree, *dialect, ScriptMode::Dynamic);
            let call = format!("{} {}", "my-tool", COMPLETE_FLAG);
            let ps_call = format!("& 'my-tool' '{}'", COMPLETE_FLAG);
            assert!(
                script.contains(&call) || script.contains(&ps_call),
                "{} script has no callback",
                dialect
            );
            assert!(script.contains(dialect.name()));
        }
    }

    #[test]
    fn test_function_prefix() {
        assert_eq!(function_prefix("my-tool"), "__my_tool");
        assert_eq!(function_prefix("app"), "__app");
    }
}
